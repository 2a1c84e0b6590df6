//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! Email uniqueness is enforced here: a unique-index violation on insert is
//! reported as [`UserRepositoryError::DuplicateEmail`], so two concurrent
//! registrations with the same address cannot both succeed.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, MySqlPool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str = "id, name, email, password_hash, blocked, last_login, created_at";

/// Ids bound per bulk statement, well under SQLite's 32766 placeholder limit
const BULK_CHUNK_SIZE: usize = 1000;

/// Errors surfaced by user repository operations
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    /// Another user already holds this email
    #[error("Email '{0}' is already registered")]
    DuplicateEmail(String),

    /// Caller passed an unusable argument (e.g. an empty id set)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying database failure
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user, returning it with its generated id
    async fn create(&self, user: &User) -> Result<User, UserRepositoryError>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError>;

    /// List every user. Order is not part of the contract.
    async fn list_all(&self) -> Result<Vec<User>, UserRepositoryError>;

    /// Record a successful login
    async fn touch_last_login(&self, id: i64, at: DateTime<Utc>)
        -> Result<(), UserRepositoryError>;

    /// Set the blocked flag on every existing user in `ids`.
    ///
    /// Unknown ids are skipped. Returns the number of rows updated.
    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> Result<u64, UserRepositoryError>;

    /// Delete every existing user in `ids`.
    ///
    /// Unknown ids are skipped. Returns the number of rows deleted.
    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, UserRepositoryError>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Deduplicate an id set, rejecting an empty one
fn distinct_ids(ids: &[i64]) -> Result<Vec<i64>, UserRepositoryError> {
    if ids.is_empty() {
        return Err(UserRepositoryError::InvalidArgument(
            "id set cannot be empty".to_string(),
        ));
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Map an insert failure, recognising unique violations on email
fn map_insert_error(err: sqlx::Error, email: &str) -> UserRepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return UserRepositoryError::DuplicateEmail(email.to_string());
        }
    }
    UserRepositoryError::Database(anyhow::Error::new(err).context("Failed to create user"))
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User, UserRepositoryError> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Mysql => create_user_mysql(self.pool.mysql()?, user).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_email_sqlite(self.pool.sqlite()?, email).await?
            }
            DatabaseDriver::Mysql => get_user_by_email_mysql(self.pool.mysql()?, email).await?,
        };
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, UserRepositoryError> {
        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => list_users_sqlite(self.pool.sqlite()?).await?,
            DatabaseDriver::Mysql => list_users_mysql(self.pool.mysql()?).await?,
        };
        Ok(users)
    }

    async fn touch_last_login(
        &self,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        let sql = "UPDATE users SET last_login = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update last login")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update last login")?;
            }
        }
        Ok(())
    }

    async fn set_blocked(&self, ids: &[i64], blocked: bool) -> Result<u64, UserRepositoryError> {
        let ids = distinct_ids(ids)?;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_blocked_sqlite(self.pool.sqlite()?, &ids, blocked).await?
            }
            DatabaseDriver::Mysql => set_blocked_mysql(self.pool.mysql()?, &ids, blocked).await?,
        };
        Ok(affected)
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> Result<u64, UserRepositoryError> {
        let ids = distinct_ids(ids)?;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_users_sqlite(self.pool.sqlite()?, &ids).await?,
            DatabaseDriver::Mysql => delete_users_mysql(self.pool.mysql()?, &ids).await?,
        };
        Ok(affected)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User, UserRepositoryError> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, blocked, last_login, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.blocked)
    .bind(user.last_login)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, &user.email))?;

    Ok(User {
        id: result.last_insert_rowid(),
        ..user.clone()
    })
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    Ok(row.as_ref().map(row_to_user_sqlite))
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    Ok(rows.iter().map(row_to_user_sqlite).collect())
}

async fn set_blocked_sqlite(pool: &SqlitePool, ids: &[i64], blocked: bool) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut affected = 0;
    for chunk in ids.chunks(BULK_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE users SET blocked = ");
        builder.push_bind(blocked);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to update blocked flag")?;
        affected += result.rows_affected();
    }
    tx.commit().await.context("Failed to commit blocked flag update")?;

    Ok(affected)
}

async fn delete_users_sqlite(pool: &SqlitePool, ids: &[i64]) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut affected = 0;
    for chunk in ids.chunks(BULK_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to delete users")?;
        affected += result.rows_affected();
    }
    tx.commit().await.context("Failed to commit user deletion")?;

    Ok(affected)
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        blocked: row.get("blocked"),
        last_login: row.get("last_login"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User, UserRepositoryError> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password_hash, blocked, last_login, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.blocked)
    .bind(user.last_login)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, &user.email))?;

    let id = i64::try_from(result.last_insert_id()).context("Generated user id out of range")?;

    Ok(User { id, ..user.clone() })
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    Ok(row.as_ref().map(row_to_user_mysql))
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;

    Ok(rows.iter().map(row_to_user_mysql).collect())
}

async fn set_blocked_mysql(pool: &MySqlPool, ids: &[i64], blocked: bool) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut affected = 0;
    for chunk in ids.chunks(BULK_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<MySql>::new("UPDATE users SET blocked = ");
        builder.push_bind(blocked);
        builder.push(" WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to update blocked flag")?;
        affected += result.rows_affected();
    }
    tx.commit().await.context("Failed to commit blocked flag update")?;

    Ok(affected)
}

async fn delete_users_mysql(pool: &MySqlPool, ids: &[i64]) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;
    let mut affected = 0;
    for chunk in ids.chunks(BULK_CHUNK_SIZE) {
        let mut builder = QueryBuilder::<MySql>::new("DELETE FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to delete users")?;
        affected += result.rows_affected();
    }
    tx.commit().await.context("Failed to commit user deletion")?;

    Ok(affected)
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        blocked: row.get("blocked"),
        last_login: row.get("last_login"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::services::password::hash_password;
    use chrono::Duration;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn create_test_user(name: &str, email: &str) -> User {
        User::new(name.to_string(), email.to_string(), "hash".to_string())
    }

    async fn seed(repo: &SqlxUserRepository, count: usize) -> Vec<i64> {
        let mut ids = Vec::new();
        for i in 0..count {
            let user = create_test_user(&format!("user{}", i), &format!("user{}@example.com", i));
            ids.push(repo.create(&user).await.expect("Failed to create user").id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_user_assigns_id() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&create_test_user("Alice", "alice@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.name, "Alice");
        assert!(!created.blocked);
        assert!(created.last_login.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_reported() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("first", "dup@example.com"))
            .await
            .expect("Failed to create first user");

        let result = repo.create(&create_test_user("second", "dup@example.com")).await;

        assert!(matches!(result, Err(UserRepositoryError::DuplicateEmail(email)) if email == "dup@example.com"));
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_user_by_email() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&create_test_user("emailuser", "unique@example.com"))
            .await
            .expect("Failed to create user");

        let found = repo
            .get_by_email("unique@example.com")
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(found.name, "emailuser");

        let missing = repo
            .get_by_email("nonexistent@example.com")
            .await
            .expect("Failed to get user");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_password_hash_stored_correctly() {
        let (_pool, repo) = setup_test_repo().await;
        let hash = hash_password("my_secure_password").expect("Failed to hash password");
        let user = User::new("hashtest".to_string(), "hashtest@example.com".to_string(), hash.clone());

        let created = repo.create(&user).await.expect("Failed to create user");
        let found = repo
            .get_by_email(&created.email)
            .await
            .expect("Failed to get user")
            .expect("User not found");

        assert_eq!(found.password_hash, hash);
        assert!(found.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 1).await;
        let at = Utc::now();

        repo.touch_last_login(ids[0], at).await.expect("Failed to touch");

        let user = repo.get_by_email("user0@example.com").await.unwrap().unwrap();
        let stored = user.last_login.expect("last_login should be set");
        assert!((stored - at).num_milliseconds().abs() < 1000);

        let later = at + Duration::seconds(5);
        repo.touch_last_login(ids[0], later).await.expect("Failed to touch");
        let user = repo.get_by_email("user0@example.com").await.unwrap().unwrap();
        assert!(user.last_login.unwrap() >= stored);
    }

    #[tokio::test]
    async fn test_set_blocked_skips_unknown_ids() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 3).await;

        let affected = repo
            .set_blocked(&[ids[0], ids[2], 9999], true)
            .await
            .expect("Failed to block");
        assert_eq!(affected, 2);

        let users = repo.list_all().await.unwrap();
        let blocked: Vec<i64> = users.iter().filter(|u| u.blocked).map(|u| u.id).collect();
        assert_eq!(blocked, vec![ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn test_block_then_unblock_restores_flag() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 2).await;

        repo.set_blocked(&ids, true).await.unwrap();
        repo.set_blocked(&ids, false).await.unwrap();

        assert!(repo.list_all().await.unwrap().iter().all(|u| !u.blocked));
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_collapsed() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 1).await;

        let affected = repo.set_blocked(&[ids[0], ids[0], ids[0]], true).await.unwrap();
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn test_delete_by_ids_removes_existing_members() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 3).await;

        let deleted = repo
            .delete_by_ids(&[ids[1], 4242])
            .await
            .expect("Failed to delete");
        assert_eq!(deleted, 1);

        let remaining: Vec<i64> = repo.list_all().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);
    }

    #[tokio::test]
    async fn test_bulk_operations_span_many_statements() {
        let (_pool, repo) = setup_test_repo().await;
        let ids = seed(&repo, 3).await;
        let mut requested: Vec<i64> = (100_000..140_000).collect();
        requested.extend(&ids);

        let blocked = repo.set_blocked(&requested, true).await.expect("Failed to block");
        assert_eq!(blocked, 3);
        assert!(repo.list_all().await.unwrap().iter().all(|u| u.blocked));

        let deleted = repo.delete_by_ids(&requested).await.expect("Failed to delete");
        assert_eq!(deleted, 3);
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_operations_reject_empty_set() {
        let (_pool, repo) = setup_test_repo().await;

        assert!(matches!(
            repo.set_blocked(&[], true).await,
            Err(UserRepositoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            repo.delete_by_ids(&[]).await,
            Err(UserRepositoryError::InvalidArgument(_))
        ));
    }
}
