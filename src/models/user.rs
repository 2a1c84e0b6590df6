//! User model
//!
//! This module defines the User entity and the view of it that leaves the
//! service layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// User entity as persisted.
///
/// The password is only ever held as an Argon2id PHC string.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// Display name
    pub name: String,
    /// Email address (unique, normalized)
    pub email: String,
    /// Password hash (argon2)
    pub password_hash: String,
    /// Blocked users cannot log in
    pub blocked: bool,
    /// Last successful login
    pub last_login: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unblocked User.
    ///
    /// Note: The password should already be hashed before calling this function.
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0, // Will be set by the database
            name,
            email,
            password_hash,
            blocked: false,
            last_login: None,
            created_at: Utc::now(),
        }
    }
}

/// Normalize an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Public view of a user.
///
/// Explicit allow-list of the attributes returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub blocked: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            blocked: user.blocked,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}
