//! User management API endpoints
//!
//! - GET /api/users - List users
//! - POST /api/block - Block users by id
//! - POST /api/unblock - Unblock users by id
//! - POST /api/users/delete - Delete users by id
//! - GET /api/health - Database liveness check

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, CurrentSession};
use crate::models::UserView;

/// Request body naming the users a bulk operation applies to
#[derive(Debug, Deserialize)]
pub struct UserIdsRequest {
    #[serde(default, rename = "userIds")]
    pub user_ids: Vec<i64>,
}

impl UserIdsRequest {
    fn ids(&self) -> Result<&[i64], ApiError> {
        if self.user_ids.is_empty() {
            return Err(ApiError::validation_error("userIds must be a non-empty array"));
        }
        Ok(&self.user_ids)
    }
}

/// Outcome of a bulk operation
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub message: String,
    pub affected: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Routes that list users (always session-gated)
pub fn list_router() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}

/// Bulk mutation routes
pub fn mutation_router() -> Router<AppState> {
    Router::new()
        .route("/block", post(block_users))
        .route("/unblock", post(unblock_users))
        .route("/users/delete", post(delete_users))
}

/// Public health routes
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// GET /api/users
async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state.user_service.list_users().await?;
    tracing::debug!("User {} listed {} user(s)", current.user_id, users.len());
    Ok(Json(users))
}

/// POST /api/block
async fn block_users(
    State(state): State<AppState>,
    body: Result<Json<UserIdsRequest>, JsonRejection>,
) -> Result<Json<BulkResponse>, ApiError> {
    let Json(body) = body?;
    let affected = state.user_service.block(body.ids()?).await?;
    Ok(Json(BulkResponse {
        message: "Users blocked".to_string(),
        affected,
    }))
}

/// POST /api/unblock
async fn unblock_users(
    State(state): State<AppState>,
    body: Result<Json<UserIdsRequest>, JsonRejection>,
) -> Result<Json<BulkResponse>, ApiError> {
    let Json(body) = body?;
    let affected = state.user_service.unblock(body.ids()?).await?;
    Ok(Json(BulkResponse {
        message: "Users unblocked".to_string(),
        affected,
    }))
}

/// POST /api/users/delete
async fn delete_users(
    State(state): State<AppState>,
    body: Result<Json<UserIdsRequest>, JsonRejection>,
) -> Result<Json<BulkResponse>, ApiError> {
    let Json(body) = body?;
    let affected = state.user_service.delete_users(body.ids()?).await?;
    Ok(Json(BulkResponse {
        message: "Users deleted".to_string(),
        affected,
    }))
}

/// GET /api/health
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::warn!("Health check failed: {:#}", e);
        ApiError::service_unavailable("Database unavailable")
    })?;
    Ok(Json(HealthResponse { status: "ok" }))
}
