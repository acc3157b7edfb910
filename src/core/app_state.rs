use std::sync::Arc;

use crate::core::config::ScoutConfig;
use crate::scraping::browser_manager::ChromeRenderer;
use crate::scraping::extract::Extractor;
use crate::tools::catalog_cache::CatalogCache;
use crate::tools::image_proxy::ImageRelay;
use crate::tools::scrape::ScrapeOrchestrator;

#[derive(Clone)]
pub struct AppState {
    /// Process-wide product cache; the only path to a scrape.
    pub catalog: CatalogCache,
    pub image_relay: ImageRelay,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cache_fresh", &self.catalog.is_fresh())
            .field("scraping", &self.catalog.is_scraping())
            .field("image_referer", &self.image_relay.referer())
            .finish()
    }
}

impl AppState {
    pub fn new(catalog: CatalogCache, image_relay: ImageRelay) -> Self {
        Self {
            catalog,
            image_relay,
        }
    }

    /// Wire the production pipeline: Chromium renderer → extractor →
    /// orchestrator → TTL cache, plus an image relay for the same site.
    pub fn from_config(config: &ScoutConfig, http_client: reqwest::Client) -> anyhow::Result<Self> {
        let target = config.resolve_target_url()?;

        let renderer = Arc::new(ChromeRenderer::new(config.render_settings()));
        let extractor = Extractor::new(config.extract_settings());
        let orchestrator = ScrapeOrchestrator::new(renderer, extractor, target.as_str());
        let catalog = CatalogCache::new(Arc::new(orchestrator), config.resolve_cache_ttl());

        Ok(Self::new(catalog, ImageRelay::for_site(http_client, &target)))
    }
}
