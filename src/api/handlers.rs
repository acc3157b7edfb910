use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};

use crate::tools::image_proxy::IMAGE_CACHE_CONTROL;
use crate::types::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn scrape_failed(e: impl std::fmt::Display) -> ApiError {
    error!("Scrape error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(e.to_string())),
    )
}

pub async fn products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let snapshot = state.catalog.get_or_scrape().await.map_err(scrape_failed)?;
    Ok(Json(ProductsResponse {
        success: true,
        count: snapshot.records.len(),
        cached: snapshot.served_from_cache,
        products: snapshot.records.as_ref().clone(),
    }))
}

pub async fn refresh_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let records = state.catalog.force_scrape().await.map_err(scrape_failed)?;
    Ok(Json(RefreshResponse {
        success: true,
        count: records.len(),
        products: records.as_ref().clone(),
    }))
}

pub async fn image_proxy(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImageProxyQuery>,
) -> Response {
    match state.image_relay.relay(query.url.as_deref()).await {
        Ok(image) => (
            [
                (header::CONTENT_TYPE, image.content_type),
                (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
            ],
            image.bytes,
        )
            .into_response(),
        Err(e) => {
            warn!("Image relay error: {}", e);
            (e.status(), Json(ErrorResponse::new(e.to_string()))).into_response()
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
