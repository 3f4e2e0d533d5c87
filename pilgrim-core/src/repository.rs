use thiserror::Error;

/// Failures surfaced by any persistence backend (Postgres, Redis, in-memory).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid: {0}")]
    Invalid(String),
    /// The unique constraint on the booking reference fired. Callers retry
    /// with a fresh reference instead of failing the submission.
    #[error("booking reference {0} is already taken")]
    DuplicateReference(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Unexpected(_))
    }
}

impl From<crate::CoreError> for StoreError {
    fn from(err: crate::CoreError) -> Self {
        match err {
            crate::CoreError::ValidationError(msg) => StoreError::Invalid(msg),
            crate::CoreError::Conflict(msg) => StoreError::Conflict(msg),
            crate::CoreError::NotFound(what) => StoreError::NotFound(what),
            other => StoreError::Unexpected(anyhow::anyhow!(other.to_string())),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
