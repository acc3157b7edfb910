pub mod handlers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Dashboard-facing JSON API.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/products", get(handlers::products))
        .route("/api/products/refresh", get(handlers::refresh_products))
        .route("/api/image-proxy", get(handlers::image_proxy))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
