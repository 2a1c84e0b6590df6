//! Data models
//!
//! Entities persisted by the repositories and the views returned by the API.

mod session;
mod user;

pub use session::Session;
pub use user::{normalize_email, User, UserView};
