//! Session service
//!
//! Creates, resolves and destroys server-side login sessions.

use crate::db::repositories::SessionRepository;
use crate::models::Session;
use crate::services::{with_store_timeout, StoreTimeout};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session with this token
    #[error("Session not found")]
    NotFound,

    /// Session existed but its expiry has passed
    #[error("Session expired")]
    Expired,

    /// Store call timed out
    #[error(transparent)]
    Timeout(#[from] StoreTimeout),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Session service backed by a [`SessionRepository`]
pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    lifetime: chrono::Duration,
    store_timeout: Duration,
}

impl SessionService {
    /// Create a session service.
    ///
    /// `lifetime` is how long a new session stays valid; `store_timeout`
    /// bounds each repository call.
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        lifetime: chrono::Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            lifetime,
            store_timeout,
        }
    }

    /// How long a new session stays valid
    pub fn lifetime(&self) -> chrono::Duration {
        self.lifetime
    }

    /// Start a new session for `user_id`
    pub async fn create(&self, user_id: i64) -> Result<Session, SessionError> {
        let session = Session::start(user_id, self.lifetime)?;
        let created = with_store_timeout(self.store_timeout, self.repo.create(&session)).await??;
        Ok(created)
    }

    /// Resolve a token to a live session.
    ///
    /// An expired row is deleted when encountered.
    pub async fn resolve(&self, token: &str) -> Result<Session, SessionError> {
        let session = with_store_timeout(self.store_timeout, self.repo.get_by_id(token))
            .await??
            .ok_or(SessionError::NotFound)?;

        if session.is_expired() {
            let cleanup = with_store_timeout(self.store_timeout, self.repo.delete(token)).await;
            if let Err(e) = cleanup.map_err(anyhow::Error::from).and_then(|r| r) {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Err(SessionError::Expired);
        }

        Ok(session)
    }

    /// Destroy a session. Unknown tokens are ignored.
    pub async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        with_store_timeout(self.store_timeout, self.repo.delete(token)).await??;
        Ok(())
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired(&self) -> Result<u64, SessionError> {
        let count =
            with_store_timeout(self.store_timeout, self.repo.delete_expired(Utc::now())).await??;
        Ok(count)
    }
}
