use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::DatabaseErrorKind;
use serde_json::json;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Unexpected Error: {0}")]
    Custom(String),

    #[error("Failed hashing password: {0}")]
    PasswordHash(String),

    #[error("Failed rendering PDF: {0}")]
    Pdf(String),

    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),

    #[error(transparent)]
    RedisError(#[from] redis::RedisError),

    #[error(transparent)]
    DbPool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
}

/// Error messages for the API Responses
pub enum ErrorMessages {
    Unexpected,
    DB,
    MissingToken,
    InvalidToken,
    InvalidCredentials,
    InactiveAccount,
    Forbidden,
}

impl fmt::Display for ErrorMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ErrorMessages::Unexpected => "An unexpected error occurred while processing the request.",
            ErrorMessages::DB => "An unforeseen database error has occurred. Kindly try again after some time.",
            ErrorMessages::MissingToken => "Authentication required. Provide a bearer token.",
            ErrorMessages::InvalidToken => "Session is invalid or has expired. Please log in again.",
            ErrorMessages::InvalidCredentials => "Invalid email or password.",
            ErrorMessages::InactiveAccount => "This account has been deactivated.",
            ErrorMessages::Forbidden => "You do not have permission to perform this action.",
        };
        write!(f, "{message}")
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        ApiError::NotFound(format!("{entity} not found"))
    }

    /// Turns a unique violation into a 409 carrying `message`
    pub fn conflict_on_unique(err: diesel::result::Error, message: &str) -> Self {
        match err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::Conflict(message.to_string())
            }
            e => e.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Diesel(diesel::result::Error::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Diesel(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            )) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client. Internal failures never leak their cause.
    fn public_message(&self) -> String {
        match self {
            ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Diesel(diesel::result::Error::NotFound) => "Record not found".to_string(),
            ApiError::Diesel(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            )) => "Record already exists".to_string(),
            ApiError::Diesel(_) | ApiError::DbPool(_) => ErrorMessages::DB.to_string(),
            _ => ErrorMessages::Unexpected.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }

        let body = json!({
            "success": false,
            "message": self.public_message(),
        });
        (status, Json(body)).into_response()
    }
}
