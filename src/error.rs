use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repositories::RepositoryError;
use crate::services::token_codec::TokenError;

/// Message shown for every token failure, so callers cannot tell which check rejected a link.
pub const INVALID_LINK_MESSAGE: &str =
    "This sign-in link is invalid or has expired. Please request a new one.";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token already used")]
    TokenAlreadyUsed,

    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    #[error("Authentication backend error: {0}")]
    Backend(String),
}

impl AuthError {
    /// True for failures caused by the link itself (decode checks or replay).
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::ExpiredToken
                | AuthError::InvalidSignature
                | AuthError::TokenAlreadyUsed
        )
    }

    /// Text that is safe to show to the end user.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidEmail => "Please enter a valid email address",
            AuthError::InvalidInput(_) => "Invalid request",
            e if e.is_link_failure() => INVALID_LINK_MESSAGE,
            _ => "Internal server error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail | AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            e if e.is_link_failure() => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidInput(msg) => AuthError::InvalidInput(msg.to_string()),
            TokenError::Malformed => AuthError::MalformedToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
        }
    }
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        AuthError::Backend(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "authentication request failed");
        } else {
            tracing::debug!(error = %self, "authentication request rejected");
        }

        let body = json!({
            "error": self.public_message(),
        });

        (status, Json(body)).into_response()
    }
}
