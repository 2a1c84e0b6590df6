//! Session model

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Session entity for user authentication
#[derive(Debug, Clone)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    /// Associated user ID
    pub user_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session for `user_id` that lives for `lifetime`.
    ///
    /// Fails when the expiry falls outside the representable date range.
    pub fn start(user_id: i64, lifetime: Duration) -> Result<Self> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(lifetime)
            .context("Session lifetime out of range")?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
            created_at: now,
        })
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
