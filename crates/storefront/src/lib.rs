//! Souk storefront library.
//!
//! Server-rendered storefront, vendor console and admin console for the
//! Souk marketplace. All data lives in the marketplace services; this crate
//! holds the browser session, talks to the services through [`api`] and
//! renders pages.
//!
//! The router is built by [`app`] so the binary and the integration tests
//! serve exactly the same stack.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::Service;
use crate::state::AppState;

/// Directory of the stylesheet, scripts and images served under `/static`.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Build the application router.
///
/// Layers, outermost first: tracing, request id, security headers, session,
/// session expiry. Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_expiry_middleware,
        ))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the auth service does not answer.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.api().is_reachable(Service::Auth).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
