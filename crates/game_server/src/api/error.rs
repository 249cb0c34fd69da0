use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::accounts::StoreError;
use crate::auth::{AuthError, ValidationError};

/// Every failure a route can answer with.
///
/// Rendered as `{"reason": <display>}` with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body")]
    BadRequest,
    #[error("illegal username or password")]
    IllegalCredentials(#[source] ValidationError),
    #[error("username existed")]
    UsernameTaken,
    #[error("username not existed")]
    UnknownUser,
    #[error("password not match")]
    PasswordMismatch,
    #[error("password encryption error")]
    Hashing,
    #[error("failed to generate token")]
    TokenIssue,
    #[error("player not found")]
    PlayerNotFound,
    #[error("{0}")]
    Unauthorized(AuthError),
    #[error("internal server error")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest
            | ApiError::IllegalCredentials(_)
            | ApiError::UsernameTaken
            | ApiError::Hashing => StatusCode::BAD_REQUEST,
            ApiError::UnknownUser
            | ApiError::PasswordMismatch
            | ApiError::TokenIssue
            | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::PlayerNotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Store(err) = &self {
            error!("❌ Account store failure: {}", err);
        }
        let body = Json(json!({ "reason": self.to_string() }));
        (self.status(), body).into_response()
    }
}
