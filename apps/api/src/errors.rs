use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::resume::SectionKey;
use crate::store::StoreError;
use crate::wizard::navigator::Step;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Not implemented")]
    NotImplemented,
}

/// Misuse of a wizard session: wrong field, wrong step, limits, locked navigation.
/// Field validation failures are NOT errors; they are returned as data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WizardError {
    #[error("unknown field '{field}'")]
    UnknownField { field: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("the {step} step is not active (current step is {current})")]
    StepNotActive { step: Step, current: Step },

    #[error("the {step} step does not hold a list of entries")]
    NotAnEntryStep { step: Step },

    #[error("the {step} step needs an entry index")]
    EntryIndexRequired { step: Step },

    #[error("entry {index} is out of range ({len} entries)")]
    EntryIndexOutOfRange { index: usize, len: usize },

    #[error("{section} allows at most {max} entries")]
    EntryLimit { section: SectionKey, max: usize },

    #[error("cannot jump to {target}: highest completed step is {highest}")]
    NavigationLocked { target: Step, highest: String },

    #[error("section '{0}' is always shown")]
    SectionLocked(SectionKey),

    #[error("invalid customization: {0}")]
    InvalidCustomization(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Store(StoreError::NotFound(id)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Resume {id} not found"),
            ),
            AppError::Store(e @ StoreError::InvalidSection { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Wizard(e) => match e {
                WizardError::EntryLimit { .. }
                | WizardError::StepNotActive { .. }
                | WizardError::NavigationLocked { .. }
                | WizardError::SectionLocked(_) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
                _ => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            AppError::NotImplemented => (
                StatusCode::NOT_IMPLEMENTED,
                "NOT_IMPLEMENTED",
                "This endpoint is not yet implemented".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wizard_conflicts_map_to_409() {
        let err = AppError::from(WizardError::EntryLimit {
            section: SectionKey::WorkExperience,
            max: 10,
        });
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unknown_field_maps_to_400() {
        let err = AppError::from(WizardError::UnknownField {
            field: "shoeSize".to_string(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_resume_maps_to_404() {
        let err = AppError::from(StoreError::NotFound(uuid::Uuid::new_v4()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
