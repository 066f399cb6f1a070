//! HTTP surface of keygate: key generation, verification, renewal and cleanup.

use axum::{
    Router,
    http::{Method, header},
    routing::get,
    routing::post,
};
use keygate_core::KeyService;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod github_client;
pub mod handlers;
pub mod scheduler;

#[derive(Clone)]
pub struct AppState {
    pub keys: KeyService,
    /// Bearer secret for `/api/cleanup`; the endpoint rejects everything when unset.
    pub cron_secret: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/generate-key", post(handlers::keys::generate_key))
        .route(
            "/api/verify-key",
            get(handlers::keys::verify_key_query).post(handlers::keys::verify_key_body),
        )
        .route("/api/renew-key", post(handlers::keys::renew_key))
        .route(
            "/api/cleanup",
            get(handlers::cleanup::cleanup).post(handlers::cleanup::cleanup),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
