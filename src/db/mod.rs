//! Database layer
//!
//! This module provides database abstraction for userdesk.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for shared deployments)
//!
//! The database driver is selected based on configuration. Repositories
//! depend only on the `DatabasePool` trait object and dispatch on its driver.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
