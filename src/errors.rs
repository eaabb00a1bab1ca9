use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to send an OTP: {0}")]
    OtpDispatch(#[source] BackendError),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] BackendError),

    #[error("User not found")]
    UserNotFound,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large")]
    FileTooLarge,

    #[error("Not found")]
    NotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::OtpDispatch(_) => StatusCode::BAD_GATEWAY,
            AppError::UploadFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::OtpDispatch(ref e) => {
                tracing::error!("OTP dispatch error: {}", e);
                "Failed to send a one-time code, please try again"
            }
            AppError::UploadFailed(ref e) => {
                tracing::error!("Upload error: {}", e);
                "Failed to upload file, please try again"
            }
            AppError::UserNotFound => "User not found",
            AppError::Backend(BackendError::NotFound(_)) => "Resource not found",
            AppError::Backend(ref e) => {
                tracing::error!("Backend error: {}", e);
                "Something went wrong, please try again"
            }
            AppError::Auth(ref msg) => msg.as_str(),
            AppError::Validation(ref msg) => msg.as_str(),
            AppError::FileTooLarge => "File too large",
            AppError::NotFound => "Resource not found",
            AppError::Config(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                "Internal server error"
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
