//! # airouter_api
//!
//! HTTP API library for airouter: authenticated streaming generation and
//! token refresh.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod routes;

use std::sync::Arc;

use airouter_core::auth::service::TokenService;
use airouter_core::strategy::StrategyRouter;
use axum::Router;
use axum::routing::post;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, generate};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Token issuance and refresh.
    pub tokens: TokenService,
    /// Platform → adapter table, fixed at startup.
    pub strategy: Arc<StrategyRouter>,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = match state.config.client_url.clone() {
        Some(origin) => CorsLayer::new().allow_origin(origin),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    let public = Router::new().route(
        routes::POST_AUTH_GOOGLE_REFRESH,
        post(auth::refresh_handler),
    );

    let protected = Router::new()
        .route(routes::POST_AI_GENERATE, post(generate::generate_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
