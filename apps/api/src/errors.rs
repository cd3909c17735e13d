use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::PrerequisiteMissing(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PREREQUISITE_MISSING",
                msg.clone(),
            ),
            AppError::Generation(msg) => {
                tracing::error!("Generation error: {msg}");
                // The underlying cause stays in the response; callers need it
                // to distinguish a bad upstream reply from a refused one.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_ERROR",
                    format!("Content generation failed: {msg}"),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, "PERSISTENCE_CONFLICT", msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
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

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(
            status_of(AppError::NotFound("no run".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_prerequisite_missing_maps_to_422() {
        assert_eq!(
            status_of(AppError::PrerequisiteMissing("no analysis".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_conflict_maps_to_409() {
        assert_eq!(
            status_of(AppError::Conflict("stale version".into())),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_generation_maps_to_500() {
        assert_eq!(
            status_of(AppError::Generation("upstream timeout".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
