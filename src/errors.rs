use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("this time slot has just been taken, please pick another one")]
    SlotTaken,

    #[error("{0}")]
    Conflict(String),

    #[error("you cannot have more than 3 confirmed appointments at the same time")]
    LimitExceeded,

    #[error("appointments must be cancelled at least 2 hours in advance")]
    TooLate,

    #[error("this appointment has already been cancelled")]
    AlreadyCancelled,

    #[error("a completed appointment cannot be cancelled")]
    InvalidTransition,

    #[error("you do not have permission to access this resource")]
    Forbidden,

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SlotTaken | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::LimitExceeded
            | AppError::TooLate
            | AppError::AlreadyCancelled
            | AppError::InvalidTransition => StatusCode::BAD_REQUEST,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }

    /// Machine-readable code the frontend switches on.
    fn code(&self) -> Option<&'static str> {
        match self {
            AppError::SlotTaken => Some("TIME_SLOT_TAKEN"),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("database error: {e}");
                "internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = match self.code() {
            Some(code) => serde_json::json!({ "error": message, "code": code }),
            None => serde_json::json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}
