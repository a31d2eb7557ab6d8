use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// SQLite extended result code for a violated UNIQUE constraint.
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("username already taken: {0}")]
    UsernameConflict(String),

    #[error("email already registered: {0}")]
    EmailConflict(String),

    #[error("account not found")]
    AccountNotFound,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable signal sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingField(_) => "missing_required_field",
            AppError::Validation(_) => "invalid_request",
            AppError::UsernameConflict(_) => "username_conflict",
            AppError::EmailConflict(_) => "email_conflict",
            AppError::AccountNotFound => "account_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Store(_) => "store_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UsernameConflict(_) | AppError::EmailConflict(_) => StatusCode::CONFLICT,
            AppError::AccountNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a UNIQUE violation raised while inserting or updating an account
    /// onto the conflict it represents. Anything else stays a store error.
    pub fn from_account_write(err: rusqlite::Error, email: &str, username: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
            if failure.extended_code == SQLITE_CONSTRAINT_UNIQUE {
                if msg.contains("accounts.username") {
                    return AppError::UsernameConflict(username.to_string());
                }
                if msg.contains("accounts.email") {
                    return AppError::EmailConflict(email.to_string());
                }
            }
        }
        AppError::Store(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                "store unavailable, try again later".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal failure");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "code": self.code(),
        });
        (status, axum::Json(body)).into_response()
    }
}
