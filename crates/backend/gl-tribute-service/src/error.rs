use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gl_remote_db::DbError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum TributeError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for TributeError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            TributeError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            TributeError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            TributeError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            TributeError::InvalidField(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            // Missing rows surface as 404 rather than an opaque failure.
            TributeError::Db(DbError::NotFound { .. }) => (StatusCode::NOT_FOUND, self.to_string()),
            TributeError::Db(_) | TributeError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        tracing::error!(%status, error = %self, "Tribute service error");

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}
