//! Userdesk - a small session-authenticated user management backend
//!
//! This library provides registration, cookie-based login sessions and
//! bulk block, unblock and delete operations over a SQL user store.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
