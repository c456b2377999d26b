use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Per-operation failures. None of these are fatal to the server.
#[derive(Debug, Display)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    AccessDenied(String),

    #[display(fmt = "{}", _0)]
    InvalidTransition(String),

    /// Scan text could not be read as a pass. The caller should rescan.
    #[display(fmt = "Invalid QR format - please scan a valid QR code")]
    InvalidPayload,

    /// Pass does not belong to a stored request of that student. The caller should rescan.
    #[display(fmt = "Invalid QR code - request not found")]
    PayloadMismatch,

    #[display(fmt = "Request was modified concurrently, please retry")]
    ConcurrentUpdate,

    #[display(fmt = "{}", _0)]
    Unauthorized(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),

    #[display(fmt = "Internal error: {}", _0)]
    Internal(String),
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl AppError {
    /// Scan failures that leave no trace and invite another attempt.
    pub fn is_rescan(&self) -> bool {
        matches!(self, AppError::InvalidPayload | AppError::PayloadMismatch)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidTransition(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AccessDenied(_) => StatusCode::FORBIDDEN,
            AppError::InvalidPayload | AppError::PayloadMismatch => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::ConcurrentUpdate | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                json!({ "error": "Internal Server Error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                json!({ "error": "Internal Server Error" })
            }
            e if e.is_rescan() => json!({ "error": e.to_string(), "rescan": true }),
            e => json!({ "error": e.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
