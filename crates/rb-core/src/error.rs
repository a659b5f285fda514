//! # AppError
//!
//! Centralized error handling for the Rusty-Board ecosystem.
//! Splits failures into what the client got wrong and what the server did.

use thiserror::Error;

/// The primary error type for all rb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, User)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Client-supplied input could not be accepted. The message is shown verbatim.
    #[error("{0}")]
    ValidationError(String),

    /// Resource already exists (e.g., duplicate username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down, broken reference)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller can fix this; anything else is a server fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Keep typed errors raised inside adapters instead of flattening them.
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => AppError::Internal(format!("{other:#}")),
        }
    }
}

/// A specialized Result type for Rusty-Board logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_verbatim() {
        let err = AppError::ValidationError("Limit and page has to be valid numbers".into());
        assert_eq!(err.to_string(), "Limit and page has to be valid numbers");
        assert!(err.is_client_error());
    }

    #[test]
    fn anyhow_errors_become_internal() {
        let err: AppError = anyhow::anyhow!("pool timed out").into();
        assert!(matches!(err, AppError::Internal(ref m) if m.contains("pool timed out")));
        assert!(!err.is_client_error());
    }

    #[test]
    fn wrapped_app_errors_survive_anyhow() {
        let inner = anyhow::Error::new(AppError::Conflict("username taken".into()));
        let err: AppError = inner.into();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
