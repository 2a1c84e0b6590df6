//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The API error type and its HTTP mapping
//! - Session authentication for protected routes

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::cookie::SessionCookie;
use crate::db::DynDatabasePool;
use crate::services::session::{SessionError, SessionService};
use crate::services::user::{UserService, UserServiceError};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub session_service: Arc<SessionService>,
    pub cookie: Arc<SessionCookie>,
}

/// Session attached to a request by [`require_session`]
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub user_id: i64,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn invalid_credentials() -> Self {
        Self::new("INVALID_CREDENTIALS", "Invalid email or password")
    }

    pub fn unauthorized_session() -> Self {
        Self::new("UNAUTHORIZED_SESSION", "A valid session is required")
    }

    pub fn account_blocked() -> Self {
        Self::new("ACCOUNT_BLOCKED", "This account is blocked")
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn store_timeout() -> Self {
        Self::new("STORE_TIMEOUT", "The data store did not respond in time")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new("SERVICE_UNAVAILABLE", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    /// HTTP status for this error code
    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED_SESSION" | "ACCOUNT_BLOCKED" => StatusCode::FORBIDDEN,
            "CONFLICT" => StatusCode::CONFLICT,
            "STORE_TIMEOUT" | "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Validation(msg) => Self::validation_error(msg),
            UserServiceError::Conflict(msg) => Self::conflict(msg),
            UserServiceError::InvalidCredentials => Self::invalid_credentials(),
            UserServiceError::AccountBlocked => Self::account_blocked(),
            UserServiceError::Timeout(t) => {
                tracing::warn!("{}", t);
                Self::store_timeout()
            }
            UserServiceError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Self::internal_error()
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound | SessionError::Expired => Self::unauthorized_session(),
            SessionError::Timeout(t) => {
                tracing::warn!("{}", t);
                Self::store_timeout()
            }
            SessionError::Internal(e) => {
                tracing::error!("Session lookup failed: {:#}", e);
                Self::internal_error()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

/// Session authentication middleware.
///
/// Rejects the request with `UNAUTHORIZED_SESSION` unless it carries a
/// correctly signed cookie naming a live session.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = state
        .cookie
        .read(request.headers())
        .ok_or_else(ApiError::unauthorized_session)?;

    let session = state.session_service.resolve(&token).await?;

    request.extensions_mut().insert(CurrentSession {
        user_id: session.user_id,
    });
    Ok(next.run(request).await)
}
