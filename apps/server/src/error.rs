//! Error types and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{resource} with id {id} not found")]
    RecordNotFound { resource: &'static str, id: i64 },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// A write referenced a row that does not exist.
    #[error("{0}")]
    ForeignKeyViolation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Transition from '{from}' to '{to}' is not allowed for role '{role}'")]
    InvalidTransition {
        from: String,
        to: String,
        role: String,
    },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::RecordNotFound { .. } | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::ForeignKeyViolation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Error::Conflict(_) | Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(_)
            | Error::Migration(_)
            | Error::Serialization(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs.
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
            match &self {
                Error::Unavailable(_) => self.to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
