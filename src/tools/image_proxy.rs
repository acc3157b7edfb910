//! Image relay: fetches a product image on the dashboard's behalf with
//! browser-like headers, so the source site's hotlink protection sees a
//! same-origin request.

use axum::body::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::core::errors::RelayError;
use crate::scraping::browser_manager::random_user_agent;

pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct RelayedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ImageRelay {
    client: Client,
    referer: String,
}

impl ImageRelay {
    pub fn new(client: Client, referer: impl Into<String>) -> Self {
        Self {
            client,
            referer: referer.into(),
        }
    }

    /// Relay whose `Referer` is the origin of the scraped site.
    pub fn for_site(client: Client, site: &Url) -> Self {
        Self::new(client, format!("{}/", site.origin().ascii_serialization()))
    }

    pub fn referer(&self) -> &str {
        &self.referer
    }

    pub async fn relay(&self, image_url: Option<&str>) -> Result<RelayedImage, RelayError> {
        let raw = image_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(RelayError::MissingUrl)?;

        let url = Url::parse(raw).map_err(|_| RelayError::InvalidUrl(raw.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUrl(raw.to_string()));
        }

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, random_user_agent())
            .header(REFERER, &self.referer)
            .header(
                ACCEPT,
                "image/avif,image/webp,image/apng,image/*,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| RelayError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Image relay upstream {} for {}", status, url);
            return Err(RelayError::Upstream(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Fetch(e.to_string()))?;

        info!("🖼️ Relayed {} ({} bytes, {})", url, bytes.len(), content_type);
        Ok(RelayedImage {
            bytes,
            content_type,
        })
    }
}
