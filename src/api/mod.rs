//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Auth endpoints (register, login, logout)
//! - User management endpoints (list, block, unblock, delete)
//! - Health check

pub mod auth;
pub mod cookie;
pub mod middleware;
pub mod users;


use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
use crate::db::DynDatabasePool;
use crate::services::{Argon2Hasher, SessionService, UserService};

pub use cookie::SessionCookie;
pub use middleware::{ApiError, AppState, CurrentSession};

/// Wire repositories, services and the cookie codec into an [`AppState`]
pub fn build_state(pool: DynDatabasePool, config: &Config, secret: &[u8]) -> Result<AppState> {
    let store_timeout = Duration::from_secs(config.database.timeout_secs);
    let lifetime = chrono::Duration::try_hours(config.session.lifetime_hours)
        .context("Session lifetime out of range")?;

    let session_service = Arc::new(SessionService::new(
        SqlxSessionRepository::boxed(pool.clone()),
        lifetime,
        store_timeout,
    ));
    let user_service = Arc::new(UserService::new(
        SqlxUserRepository::boxed(pool.clone()),
        session_service.clone(),
        Argon2Hasher::boxed(),
        store_timeout,
    ));
    let cookie = SessionCookie::new(
        config.session.cookie_name.clone(),
        secret,
        config.session.cookie_secure,
        lifetime,
    )?;

    Ok(AppState {
        pool,
        user_service,
        session_service,
        cookie: Arc::new(cookie),
    })
}

/// Build the API router.
///
/// Listing users always requires a session. With `protect_mutations` the
/// block, unblock and delete routes require one too.
pub fn build_api_router(state: AppState, protect_mutations: bool) -> Router<AppState> {
    let session_layer =
        axum_middleware::from_fn_with_state(state, middleware::require_session);

    let protected_routes = users::list_router().route_layer(session_layer.clone());

    let mutation_routes = if protect_mutations {
        users::mutation_router().route_layer(session_layer)
    } else {
        users::mutation_router()
    };

    Router::new()
        .merge(auth::router())
        .merge(users::health_router())
        .merge(protected_routes)
        .merge(mutation_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let origin = config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", config.server.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest(
            "/api",
            build_api_router(state.clone(), config.auth.protect_mutations),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
