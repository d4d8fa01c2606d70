//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Error bodies are JSON: `{"detail": "..."}`. Internal details never leave
//! the process.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::pictures::{PictureError, ValidationError};

/// Response header carrying the anonymous caller's remaining pictures today.
pub const PICS_LEFT_HEADER: &str = "pics-left-day";

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Picture request rejected.
    #[error("Picture error: {0}")]
    Picture(#[from] PictureError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A dependency is not reachable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Picture(PictureError::Validation(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Picture(err) => match err {
                PictureError::Validation(ValidationError::UnsupportedContentType(_)) => {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                }
                PictureError::Validation(ValidationError::TooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                PictureError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PictureError::QuotaExceeded => StatusCode::NOT_ACCEPTABLE,
                PictureError::Unauthenticated | PictureError::Forbidden => {
                    StatusCode::UNAUTHORIZED
                }
                PictureError::NoFaceDetected => StatusCode::CONFLICT,
                PictureError::Processing | PictureError::Persistence => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::Unauthenticated => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidEmail(_)
                | AuthError::InvalidName { .. }
                | AuthError::WeakPassword(_)
                | AuthError::EmptyPassword => StatusCode::BAD_REQUEST,
                AuthError::Signing(_) | AuthError::PasswordHash | AuthError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show to the client.
    fn client_message(&self) -> String {
        match self {
            Self::Picture(err) => match err {
                PictureError::Processing | PictureError::Persistence => {
                    "Internal server error".to_owned()
                }
                PictureError::QuotaExceeded => {
                    "Daily limit reached, create an account for more pictures".to_owned()
                }
                other => other.to_string(),
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Incorrect username or password".to_owned(),
                AuthError::Unauthenticated => "Could not validate credentials".to_owned(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::InvalidEmail(_) => "Invalid email address".to_owned(),
                AuthError::InvalidName { .. } | AuthError::WeakPassword(_) | AuthError::EmptyPassword => {
                    err.to_string()
                }
                AuthError::Signing(_) | AuthError::PasswordHash | AuthError::Repository(_) => {
                    "Internal server error".to_owned()
                }
            },
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::BadRequest(msg) => msg.clone(),
            Self::ServiceUnavailable(_) => "Service unavailable".to_owned(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let mut response = (status, Json(json!({ "detail": self.client_message() }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        if status == StatusCode::NOT_ACCEPTABLE {
            response
                .headers_mut()
                .insert(PICS_LEFT_HEADER, HeaderValue::from_static("0"));
        }

        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after successful authentication.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}
