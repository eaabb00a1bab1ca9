use crate::{backend::BackendError, errors::AppError};

pub mod files;
pub mod revalidation;
pub mod saga;
pub mod users;

pub use files::*;
pub use revalidation::*;
pub use saga::*;
pub use users::*;

/// Logs a backend failure with context and converts it for re-raising.
pub(crate) fn handle_error(message: &'static str) -> impl FnOnce(BackendError) -> AppError {
    move |error| {
        tracing::error!(error = %error, "{}", message);
        AppError::Backend(error)
    }
}
