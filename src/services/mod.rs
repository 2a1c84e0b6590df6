//! Services layer - Business logic
//!
//! Services are responsible for:
//! - Implementing business rules
//! - Coordinating between repositories, the session store and the hasher
//! - Handling validation and error cases
//!
//! Every store call made by a service is bounded by the configured store
//! timeout.

pub mod password;
pub mod session;
pub mod user;

use std::future::Future;
use std::time::Duration;

pub use password::{hash_password, verify_password, Argon2Hasher, CredentialHasher};
pub use session::{SessionError, SessionService};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};

/// A store call did not complete within its time limit
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("Store call exceeded {0:?}")]
pub struct StoreTimeout(pub Duration);

/// Run a store call, failing with [`StoreTimeout`] if it takes longer than `limit`
pub(crate) async fn with_store_timeout<F, T>(limit: Duration, fut: F) -> Result<T, StoreTimeout>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreTimeout(limit))
}
