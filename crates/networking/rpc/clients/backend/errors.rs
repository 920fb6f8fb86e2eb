#[derive(Debug, thiserror::Error)]
pub enum BackendClientError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("Failed to parse url: {0}")]
    ParseUrlError(String),
    #[error("Backend answered {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("Error: {0}")]
    Custom(String),
}
