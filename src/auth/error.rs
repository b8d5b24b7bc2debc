use std::fmt;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::repo::StoreError;

/// What a one-time token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPurpose::EmailVerification => f.write_str("Email verification"),
            TokenPurpose::PasswordReset => f.write_str("Password reset"),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered.")]
    DuplicateEmail,

    #[error("User not found.")]
    UserNotFound,

    #[error("Password is incorrect.")]
    InvalidCredentials,

    #[error("Email verification token failed, or email is already verified.")]
    AlreadyVerifiedOrNotFound,

    #[error("{0} token failed.")]
    TokenInvalid(TokenPurpose),

    #[error("{0} token expired.")]
    TokenExpired(TokenPurpose),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AuthError::DuplicateEmail,
            StoreError::Other(e) => AuthError::Internal(e),
        }
    }
}

// Malformed bodies and query strings render through the same `{ message }` shape.
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AuthError {
    fn from(rejection: QueryRejection) -> Self {
        AuthError::BadRequest(rejection.body_text())
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AlreadyVerifiedOrNotFound
            | AuthError::BadRequest(_)
            | AuthError::TokenInvalid(_)
            | AuthError::TokenExpired(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
