use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("content blocked: {reason}")]
    ContentBlocked { reason: String },

    #[error("forbidden: cannot {action}")]
    Forbidden { action: &'static str },

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("no active deletion request for this conversation")]
    RequestNotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Returns whether this error is retryable (e.g., a transient storage
    /// failure). Validation, authorization and moderation outcomes are
    /// final and must never be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(_))
    }
}

/// Errors produced by the persistence boundary.
///
/// `Conflict` reports a uniqueness violation (e.g., two writers racing to
/// create the conversation for the same participant pair). Services resolve
/// it by re-reading; it never reaches callers as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0}")]
    Conflict(&'static str),

    #[error("{0} row not found")]
    RowNotFound(&'static str),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RowNotFound(resource) => AppError::NotFound { resource },
            // A conflict that was not handled at the call site means the
            // caller skipped the re-read protocol; surface it as a storage
            // fault rather than inventing a user-facing kind for it.
            StoreError::Conflict(what) => {
                AppError::Storage(format!("unresolved conflict on {what}"))
            }
            StoreError::Backend(msg) => AppError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_retryable() {
        assert!(AppError::Storage("connection reset".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::ContentBlocked {
            reason: "nope".into()
        }
        .is_retryable());
        assert!(!AppError::Forbidden { action: "x" }.is_retryable());
    }

    #[test]
    fn store_not_found_maps_to_app_not_found() {
        let err: AppError = StoreError::RowNotFound("conversation").into();
        assert!(matches!(
            err,
            AppError::NotFound {
                resource: "conversation"
            }
        ));
    }
}
