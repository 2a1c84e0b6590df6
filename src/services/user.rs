//! User service
//!
//! Implements business logic for user management:
//! - Registration with hashed credentials and unique emails
//! - Login (blocked check, password check, last-login refresh, new session)
//! - Listing users as public views
//! - Bulk block, unblock and delete by id set

use crate::db::repositories::{UserRepository, UserRepositoryError};
use crate::models::{normalize_email, Session, User, UserView};
use crate::services::password::CredentialHasher;
use crate::services::session::{SessionError, SessionService};
use crate::services::{with_store_timeout, StoreTimeout};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Email already registered
    #[error("{0}")]
    Conflict(String),

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account is blocked and may not log in
    #[error("Account is blocked")]
    AccountBlocked,

    /// Store call timed out
    #[error(transparent)]
    Timeout(#[from] StoreTimeout),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<UserRepositoryError> for UserServiceError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::DuplicateEmail(email) => {
                Self::Conflict(format!("Email '{}' is already registered", email))
            }
            UserRepositoryError::InvalidArgument(msg) => Self::Validation(msg),
            UserRepositoryError::Database(e) => Self::Internal(e),
        }
    }
}

impl From<SessionError> for UserServiceError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Timeout(t) => Self::Timeout(t),
            SessionError::Internal(e) => Self::Internal(e),
            other => Self::Internal(anyhow::anyhow!(other)),
        }
    }
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    /// Create a new registration input
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    /// Create a new login input
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    sessions: Arc<SessionService>,
    hasher: Arc<dyn CredentialHasher>,
    store_timeout: Duration,
}

impl UserService {
    /// Create a new user service
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        sessions: Arc<SessionService>,
        hasher: Arc<dyn CredentialHasher>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            user_repo,
            sessions,
            hasher,
            store_timeout,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is empty or the email has no `@`
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        validate_register_input(&input)?;

        let email = normalize_email(&input.email);
        let existing =
            with_store_timeout(self.store_timeout, self.user_repo.get_by_email(&email)).await??;
        if existing.is_some() {
            return Err(UserServiceError::Conflict(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let hasher = self.hasher.clone();
        let password = input.password;
        let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;

        let user = User::new(input.name.trim().to_string(), email, password_hash);

        // The unique index still decides races between concurrent registrations
        let created = with_store_timeout(self.store_timeout, self.user_repo.create(&user)).await??;

        tracing::info!("Registered user {}", created.id);
        Ok(created)
    }

    /// Login with credentials, returning the new session.
    ///
    /// A blocked account is rejected before its password is checked.
    ///
    /// # Errors
    ///
    /// - `Validation` if email or password is empty
    /// - `InvalidCredentials` for an unknown email or wrong password
    /// - `AccountBlocked` if the user is blocked
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(UserServiceError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let email = normalize_email(&input.email);
        let user = with_store_timeout(self.store_timeout, self.user_repo.get_by_email(&email))
            .await??
            .ok_or(UserServiceError::InvalidCredentials)?;

        if user.blocked {
            tracing::info!("Rejected login for blocked user {}", user.id);
            return Err(UserServiceError::AccountBlocked);
        }

        let hasher = self.hasher.clone();
        let password = input.password;
        let stored_hash = user.password_hash.clone();
        let password_valid =
            tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
                .await
                .context("Password verification task failed")?
                .context("Failed to verify password")?;
        if !password_valid {
            return Err(UserServiceError::InvalidCredentials);
        }

        with_store_timeout(
            self.store_timeout,
            self.user_repo.touch_last_login(user.id, Utc::now()),
        )
        .await??;

        let session = self.sessions.create(user.id).await?;

        tracing::info!("User {} logged in", user.id);
        Ok(session)
    }

    /// List every user as a public view
    pub async fn list_users(&self) -> Result<Vec<UserView>, UserServiceError> {
        let users = with_store_timeout(self.store_timeout, self.user_repo.list_all()).await??;
        Ok(users.into_iter().map(UserView::from).collect())
    }

    /// Block every existing user in `ids`
    pub async fn block(&self, ids: &[i64]) -> Result<u64, UserServiceError> {
        let affected =
            with_store_timeout(self.store_timeout, self.user_repo.set_blocked(ids, true)).await??;
        tracing::info!("Blocked {} user(s)", affected);
        Ok(affected)
    }

    /// Unblock every existing user in `ids`
    pub async fn unblock(&self, ids: &[i64]) -> Result<u64, UserServiceError> {
        let affected =
            with_store_timeout(self.store_timeout, self.user_repo.set_blocked(ids, false)).await??;
        tracing::info!("Unblocked {} user(s)", affected);
        Ok(affected)
    }

    /// Delete every existing user in `ids`; their sessions go with them
    pub async fn delete_users(&self, ids: &[i64]) -> Result<u64, UserServiceError> {
        let affected =
            with_store_timeout(self.store_timeout, self.user_repo.delete_by_ids(ids)).await??;
        tracing::info!("Deleted {} user(s)", affected);
        Ok(affected)
    }
}

fn validate_register_input(input: &RegisterInput) -> Result<(), UserServiceError> {
    if input.name.trim().is_empty() {
        return Err(UserServiceError::Validation(
            "Name cannot be empty".to_string(),
        ));
    }

    if input.email.trim().is_empty() {
        return Err(UserServiceError::Validation(
            "Email cannot be empty".to_string(),
        ));
    }

    if input.password.is_empty() {
        return Err(UserServiceError::Validation(
            "Password cannot be empty".to_string(),
        ));
    }

    if !input.email.contains('@') {
        return Err(UserServiceError::Validation(
            "Invalid email format".to_string(),
        ));
    }

    Ok(())
}
