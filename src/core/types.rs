use serde::{Deserialize, Serialize};

/// Sentinel for a title or price no heuristic could recover.
pub const NOT_AVAILABLE: &str = "N/A";

/// One scraped listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    /// 1-based position within a single scrape batch. Not stable across scrapes.
    pub id: usize,
    pub title: String,
    pub price: String,
    /// Absolute image URL, or empty when the card had none.
    pub image: String,
    /// Canonical product-detail URL; the dedup key within a scrape.
    pub url: String,
}

/// A rendered page handed from the renderer to the extractor.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after navigation; relative links resolve against it.
    pub url: String,
    pub html: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductsResponse {
    pub success: bool,
    pub count: usize,
    pub cached: bool,
    pub products: Vec<ProductRecord>,
}

/// `/api/products/refresh` shape: always fresh, so no `cached` flag.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub count: usize,
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ImageProxyQuery {
    #[serde(default)]
    pub url: Option<String>,
}
