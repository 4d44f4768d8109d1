use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error type for the statement monitor.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network-level or bank-side failures. These never escalate past a log
    /// line in the polling loop; the account simply stays due.
    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Returns true for failures that should be retried on the next poll pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::Transient("timeout".to_string()).is_transient());
        assert!(!AppError::Validation("bad amount".to_string()).is_transient());
        assert!(!AppError::NotFound("tx".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::Validation("sum exceeds available amount".to_string());
        assert_eq!(err.to_string(), "Validation error: sum exceeds available amount");
    }
}
