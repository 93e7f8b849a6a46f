//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking::BookingError;
use store::StoreError;

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing, invalid, or expired credentials.
    Unauthorized(String),
    /// Authenticated but not allowed to touch this resource.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// The payment charge was declined or unreachable.
    PaymentFailed(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::PaymentFailed(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::AppointmentNotFound(_) | StoreError::UserNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StoreError::DuplicateEmail | StoreError::Domain(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StoreError::Database(_) | StoreError::Corrupt(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(e) => ApiError::BadRequest(e.to_string()),
            BookingError::Payment(e) => ApiError::PaymentFailed(e.to_string()),
            BookingError::Store(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken
            | AuthError::InvalidEmail
            | AuthError::PasswordTooShort
            | AuthError::InvalidResetToken => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidSession => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Hashing => ApiError::Internal(err.to_string()),
            AuthError::Store(e) => e.into(),
        }
    }
}
