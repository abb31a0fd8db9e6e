pub mod ai;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod persist;
pub mod segment;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{InferenceClient, OllamaClient};
pub use clipboard::{copy_code, Banner, BannerKind, BannerSlot, ClipboardSink, SystemClipboard};
pub use config::Config;
pub use controller::{ConversationController, Submission, SubmissionState};
pub use error::{CopyError, SubmitError, TransportError};
pub use filter::filter;
pub use persist::{FileStore, KeyValueStore, MemoryStore};
pub use segment::{code_blocks, segment, Segment, SegmentKind};
pub use state::{ChatMessage, ChatRole, Conversation, MessagePatch};
pub use store::{ChatStore, StoreSnapshot};
