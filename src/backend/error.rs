use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Backend returned {code} ({kind}): {message}")]
    Api {
        code: u16,
        kind: String,
        message: String,
    },

    #[error("Failed to decode backend payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, BackendError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
