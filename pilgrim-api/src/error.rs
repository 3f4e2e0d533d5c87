use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pilgrim_core::{CoreError, StoreError};
use pilgrim_order::{AdminError, AllocationError, ConsultationError, SubmitError, WizardError};
use serde_json::{json, Value};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    /// `fields` carries per-field messages when the form can show them inline.
    ValidationError { message: String, fields: Option<Value> },
    NotFoundError(String),
    ConflictError(String),
    /// Transient failure; the same request may succeed later.
    Unavailable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
            fields: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::AuthenticationError(msg)
            | AppError::AuthorizationError(msg)
            | AppError::NotFoundError(msg)
            | AppError::ConflictError(msg) => json!({ "error": msg }),
            AppError::ValidationError { message, fields } => match fields {
                Some(fields) => json!({ "error": message, "fields": fields }),
                None => json!({ "error": message }),
            },
            AppError::Unavailable(msg) => {
                tracing::warn!("Service temporarily unavailable: {}", msg);
                json!({ "error": "Service temporarily unavailable, please try again", "retryable": true })
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "error": "Internal Server Error" })
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                json!({ "error": "Internal Server Error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            StoreError::Conflict(msg) => AppError::ConflictError(msg),
            StoreError::Invalid(msg) => AppError::validation(msg),
            dup @ StoreError::DuplicateReference(_) => AppError::ConflictError(dup.to_string()),
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::Unexpected(err) => AppError::Anyhow(err),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::validation(msg),
            CoreError::Conflict(msg) => AppError::ConflictError(msg),
            CoreError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            CoreError::Unauthorized => AppError::AuthenticationError(err.to_string()),
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<WizardError> for AppError {
    fn from(err: WizardError) -> Self {
        match err {
            WizardError::WrongStep { .. }
            | WizardError::CannotAdvance(_)
            | WizardError::CannotRetreat(_)
            | WizardError::InvalidJump { .. }
            | WizardError::AlreadySubmitted => AppError::ConflictError(err.to_string()),
            other => AppError::validation(other.to_string()),
        }
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Wizard(err) => err.into(),
            exhausted @ SubmitError::Allocation(AllocationError::Exhausted { .. }) => {
                AppError::ConflictError(format!("{}; please submit again", exhausted))
            }
            SubmitError::Allocation(AllocationError::Store(err)) | SubmitError::Store(err) => err.into(),
            claimed @ SubmitError::AlreadyClaimed => AppError::ConflictError(claimed.to_string()),
        }
    }
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::Invalid(fields) => AppError::ValidationError {
                message: "Please correct the highlighted fields".into(),
                fields: serde_json::to_value(fields).ok(),
            },
            ConsultationError::Store(err) => err.into(),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::Unauthorized => AppError::AuthenticationError(err.to_string()),
            AdminError::Validation(msg) => AppError::validation(msg),
            AdminError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            AdminError::Conflict(msg) => AppError::ConflictError(msg),
            AdminError::Store(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (StoreError::Unavailable("pool timed out".into()).into(), StatusCode::SERVICE_UNAVAILABLE),
            (StoreError::DuplicateReference("PLG-AAAAA".into()).into(), StatusCode::CONFLICT),
            (WizardError::AlreadySubmitted.into(), StatusCode::CONFLICT),
            (WizardError::TermsNotAccepted.into(), StatusCode::BAD_REQUEST),
            (AdminError::Unauthorized.into(), StatusCode::UNAUTHORIZED),
            (
                SubmitError::Allocation(AllocationError::Exhausted { attempts: 10 }).into(),
                StatusCode::CONFLICT,
            ),
            (SubmitError::AlreadyClaimed.into(), StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{:?}", err);
        }
    }
}
