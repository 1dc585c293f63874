//! Application error type.
//!
//! Transport mapping (HTTP/gRPC status codes) is the calling layer's job;
//! this crate only distinguishes the error kinds the drawer core produces.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed a validation or invariant check. No write happened.
    #[error("Validation error: {0}")]
    Validation(anyhow::Error),

    /// The operation lost to existing state: a second open session for the
    /// same operator, a refund past the refundable remainder, a duplicate
    /// receipt number.
    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::DatabaseError(_) => "db_error",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        let err = AppError::Conflict(anyhow::anyhow!("operator already has an open session"));
        assert_eq!(err.kind(), "conflict");
        assert_eq!(
            err.to_string(),
            "Conflict: operator already has an open session"
        );
    }
}
