use thiserror::Error;

/// The inference endpoint could not produce an answer
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to inference endpoint failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("inference task did not complete: {0}")]
    Aborted(String),
}

/// The clipboard rejected a write
#[derive(Debug, Error)]
#[error("clipboard write failed: {0}")]
pub struct CopyError(pub String);

/// Why a submission was not accepted
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("input is empty")]
    EmptyInput,

    #[error("a request is already in flight")]
    Busy,
}
