//! Access Error Types
//!
//! Access-specific error variants that integrate with the unified
//! `kernel::error::AppError` system. Internal reasons are kept distinct for
//! logging; the user-facing messages only say what is safe to reveal.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::crypto::CryptoError;
use platform::csrf::CsrfError;
use thiserror::Error;

use crate::domain::value_object::code_rejection::CodeRejection;

/// Access-specific result type alias
pub type AccessResult<T> = Result<T, AccessError>;

/// Access-specific error variants
#[derive(Debug, Error)]
pub enum AccessError {
    /// Missing or malformed request input; the message is shown to the user
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSRF proof missing or invalid
    #[error("CSRF verification failed: {0}")]
    CsrfRejected(#[from] CsrfError),

    /// Too many attempts for this client and action
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Redemption code failed validation
    #[error("Code rejected: {}", .0.reason())]
    CodeRejected(CodeRejection),

    /// No live session bound to this client
    #[error("Session not found, expired or bound elsewhere")]
    SessionInvalid,

    /// Unknown or inactive video
    #[error("Video not found")]
    VideoNotFound,

    /// Session grant shorter than the video requires
    #[error("Insufficient session duration: required {required_minutes}, session {session_minutes}")]
    InsufficientDuration {
        required_minutes: i32,
        session_minutes: i32,
    },

    /// No resolver for the integration type, or the resolver failed
    #[error("Playback resolver failed: {0}")]
    Resolver(String),

    /// Generated session token already exists
    #[error("Session token collision")]
    TokenCollision,

    /// Code value already exists
    #[error("Code already exists")]
    CodeTaken,

    /// Video id already exists
    #[error("Video already exists")]
    VideoTaken,

    /// Cryptographic failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AccessError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::InvalidInput(_) => ErrorKind::BadRequest,
            AccessError::CsrfRejected(_)
            | AccessError::CodeRejected(_)
            | AccessError::InsufficientDuration { .. } => ErrorKind::Forbidden,
            AccessError::RateLimited => ErrorKind::TooManyRequests,
            AccessError::SessionInvalid => ErrorKind::Unauthorized,
            AccessError::VideoNotFound => ErrorKind::NotFound,
            AccessError::CodeTaken | AccessError::VideoTaken => ErrorKind::Conflict,
            AccessError::Resolver(_)
            | AccessError::TokenCollision
            | AccessError::Crypto(_)
            | AccessError::Database(_)
            | AccessError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Request body missing or not valid JSON
    pub fn unreadable_body() -> Self {
        AccessError::InvalidInput("The request body is not valid JSON.".to_string())
    }

    /// Message safe to show to the client
    pub fn user_message(&self) -> String {
        match self {
            AccessError::InvalidInput(msg) => msg.clone(),
            AccessError::CsrfRejected(_) => {
                "Security check failed. Please refresh the page and try again.".to_string()
            }
            AccessError::RateLimited => "Too many attempts. Please try again later.".to_string(),
            AccessError::CodeRejected(rejection) => rejection.user_message().to_string(),
            AccessError::SessionInvalid => "Access denied. Please redeem a code.".to_string(),
            AccessError::VideoNotFound => "Video not found.".to_string(),
            AccessError::InsufficientDuration { .. } => {
                "Your session does not include enough time for this video.".to_string()
            }
            AccessError::Resolver(_) => "Unable to generate video access.".to_string(),
            AccessError::CodeTaken => "A code with this value already exists.".to_string(),
            AccessError::VideoTaken => "A video with this id already exists.".to_string(),
            AccessError::TokenCollision
            | AccessError::Crypto(_)
            | AccessError::Database(_)
            | AccessError::Internal(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.user_message());
        match self {
            AccessError::InsufficientDuration {
                required_minutes,
                session_minutes,
            } => err
                .with_extension("required_minutes", *required_minutes)
                .with_extension("session_minutes", *session_minutes),
            AccessError::SessionInvalid => err.with_action("Redeem a code to start a session."),
            _ => err,
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AccessError::Database(e) => {
                tracing::error!(error = %e, "Access database error");
            }
            AccessError::Crypto(e) => {
                tracing::error!(error = %e, "Access crypto error");
            }
            AccessError::Resolver(msg) => {
                tracing::error!(message = %msg, "Playback resolver error");
            }
            AccessError::Internal(msg) => {
                tracing::error!(message = %msg, "Access internal error");
            }
            AccessError::TokenCollision => {
                tracing::error!("Session token collided twice");
            }
            AccessError::CsrfRejected(e) => {
                tracing::warn!(reason = %e, "CSRF proof rejected");
            }
            AccessError::RateLimited => {
                tracing::warn!("Request refused by rate limiter");
            }
            AccessError::CodeRejected(rejection) => {
                tracing::warn!(reason = rejection.reason(), "Redemption code rejected");
            }
            _ => {
                tracing::debug!(error = %self, "Access error");
            }
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        self.log();
        match self {
            // Pool exhaustion and outages surface as 503 instead of 500
            AccessError::Database(e) => AppError::from(e).into_response(),
            other => other.to_app_error().into_response(),
        }
    }
}
