use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;

use crate::models::application::ApplicationStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    #[error("Concurrent modification: expected version {expected}, found {actual}")]
    ConcurrentModification { expected: i64, actual: i64 },

    #[error("Interview conflict with interview {interview_id}")]
    InterviewConflict { interview_id: Uuid },

    #[error("Only the author may edit this note")]
    NotAuthor,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Already terminal: {0}")]
    AlreadyTerminal(String),

    #[error("Candidate has already applied to this job")]
    DuplicateApplication,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable kind, used in response bodies and bulk reports.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::BadRequest(_) => "bad_request",
            Error::Unauthorized(_) => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::ConcurrentModification { .. } => "concurrent_modification",
            Error::InterviewConflict { .. } => "interview_conflict",
            Error::NotAuthor => "not_author",
            Error::NotAuthorized(_) => "not_authorized",
            Error::AlreadyTerminal(_) => "already_terminal",
            Error::DuplicateApplication => "duplicate_application",
            Error::Database(_) => "database",
            Error::Migrate(_) => "migration",
            Error::Validation(_) => "validation",
            Error::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::NotAuthor | Error::NotAuthorized(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ConcurrentModification { .. }
            | Error::InterviewConflict { .. }
            | Error::AlreadyTerminal(_)
            | Error::DuplicateApplication => StatusCode::CONFLICT,
            Error::Config(_) | Error::Database(_) | Error::Migrate(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error_message = match &self {
            Error::Database(err) => {
                tracing::error!(error = %err, "database failure");
                "An unexpected error occurred".to_string()
            }
            Error::Config(_) | Error::Migrate(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "internal failure");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({ "error": error_message, "code": self.code() });
        match &self {
            Error::InterviewConflict { interview_id } => {
                body["conflicting_interview_id"] = json!(interview_id);
            }
            Error::ConcurrentModification { actual, .. } => {
                body["current_version"] = json!(actual);
            }
            _ => {}
        }
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_conflict_or_unprocessable() {
        let conflict = Error::InterviewConflict {
            interview_id: Uuid::new_v4(),
        };
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "interview_conflict");

        let invalid = Error::InvalidTransition {
            from: ApplicationStatus::Applied,
            to: ApplicationStatus::Offered,
        };
        assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(invalid.to_string(), "Invalid transition from applied to offered");

        assert_eq!(Error::NotAuthor.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
