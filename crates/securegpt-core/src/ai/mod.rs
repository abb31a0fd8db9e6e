pub mod ollama;

pub use ollama::OllamaClient;

use async_trait::async_trait;

use crate::error::TransportError;

/// Something that turns a prompt into generated text
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, TransportError>;
}
