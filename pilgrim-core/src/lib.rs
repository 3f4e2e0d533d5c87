pub mod auth;
pub mod money;
pub mod notification;
pub mod payment;
pub mod repository;

pub use auth::{require_admin, AuthGate, Unauthenticated};
pub use money::Currency;
pub use notification::Notifier;
pub use payment::PaymentMethod;
pub use repository::{StoreError, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: admin session required")]
    Unauthorized,
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => CoreError::NotFound(what),
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::Invalid(msg) => CoreError::ValidationError(msg),
            StoreError::DuplicateReference(reference) => {
                CoreError::Conflict(format!("booking reference {} already exists", reference))
            }
            StoreError::Unavailable(msg) => CoreError::InternalError(msg),
            StoreError::Unexpected(err) => CoreError::InternalError(err.to_string()),
        }
    }
}
