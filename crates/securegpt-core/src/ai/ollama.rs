use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::InferenceClient;
use crate::error::TransportError;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// Client for Ollama's non-streaming `/api/generate` endpoint
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    pub async fn query(&self, prompt: &str) -> Result<String, TransportError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!(model = %self.model, prompt_len = prompt.len(), "sending generate request");

        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }

        let ollama_response: OllamaResponse = response.json().await?;
        Ok(ollama_response.response)
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, TransportError> {
        self.query(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request with `status` and `body`, returning the base URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // The JSON request body is the last thing sent
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.ends_with(b"}") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(OllamaRequest {
            model: "deepseek-coder-v2",
            prompt: "hi",
            stream: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "deepseek-coder-v2", "prompt": "hi", "stream": false})
        );
    }

    #[test]
    fn test_response_ignores_extra_fields() {
        let parsed: OllamaResponse =
            serde_json::from_str(r#"{"model":"m","response":"Use bcrypt.","done":true}"#).unwrap();
        assert_eq!(parsed.response, "Use bcrypt.");
    }

    #[test]
    fn test_trailing_slash_in_endpoint() {
        let client = OllamaClient::new("http://localhost:11434/", "m");
        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_a_request_error() {
        // Port 9 (discard) is essentially never serving HTTP locally
        let client = OllamaClient::new("http://127.0.0.1:9", "m");
        let err = client.query("hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_a_status_error() {
        let url = serve_once("500 Internal Server Error", r#"{"error":"model crashed"}"#).await;
        let client = OllamaClient::new(&url, "m");
        let err = client.query("hi").await.unwrap_err();
        assert!(matches!(err, TransportError::Status(s) if s == 500));
    }

    #[tokio::test]
    async fn test_successful_generate_returns_response_text() {
        let url = serve_once("200 OK", r#"{"model":"m","response":"Use bcrypt.","done":true}"#).await;
        let client = OllamaClient::new(&url, "m");
        assert_eq!(client.query("hi").await.unwrap(), "Use bcrypt.");
    }
}
