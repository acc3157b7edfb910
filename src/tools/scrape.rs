use crate::core::errors::ScrapeError;
use crate::scraping::extract::Extractor;
use crate::scraping::PageRenderer;
use crate::types::ProductRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Produces one complete product list per call, or fails wholesale.
#[async_trait]
pub trait CatalogScraper: Send + Sync {
    async fn scrape(&self) -> Result<Vec<ProductRecord>, ScrapeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapePhase {
    Idle,
    Rendering,
    Extracting,
    Done,
    Failed,
}

impl std::fmt::Display for ScrapePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScrapePhase::Idle => "idle",
            ScrapePhase::Rendering => "rendering",
            ScrapePhase::Extracting => "extracting",
            ScrapePhase::Done => "done",
            ScrapePhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Phase bookkeeping for one scrape attempt.
struct ScrapeRun {
    phase: ScrapePhase,
    started: Instant,
}

impl ScrapeRun {
    fn start() -> Self {
        Self {
            phase: ScrapePhase::Idle,
            started: Instant::now(),
        }
    }

    fn enter(&mut self, next: ScrapePhase) {
        debug!(
            "scrape phase {} → {} (+{}ms)",
            self.phase,
            next,
            self.started.elapsed().as_millis()
        );
        self.phase = next;
    }

    fn fail(&mut self, err: ScrapeError) -> ScrapeError {
        error!("❌ Scrape failed while {}: {}", self.phase, err);
        self.enter(ScrapePhase::Failed);
        err
    }
}

/// Render → extract for one configured category page.
///
/// The renderer owns and releases its browser inside `render`, so by the
/// time extraction starts the browser is already gone; extraction works on
/// the HTML snapshot alone.
pub struct ScrapeOrchestrator {
    renderer: Arc<dyn PageRenderer>,
    extractor: Arc<Extractor>,
    target_url: String,
}

impl ScrapeOrchestrator {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        extractor: Extractor,
        target_url: impl Into<String>,
    ) -> Self {
        Self {
            renderer,
            extractor: Arc::new(extractor),
            target_url: target_url.into(),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

#[async_trait]
impl CatalogScraper for ScrapeOrchestrator {
    async fn scrape(&self) -> Result<Vec<ProductRecord>, ScrapeError> {
        let mut run = ScrapeRun::start();
        info!("Scraping catalog: {}", self.target_url);

        run.enter(ScrapePhase::Rendering);
        let page = match self.renderer.render(&self.target_url).await {
            Ok(page) => page,
            Err(e) => return Err(run.fail(e.into())),
        };

        run.enter(ScrapePhase::Extracting);
        let extractor = Arc::clone(&self.extractor);
        // HTML parsing is CPU-bound; a panic in there surfaces as a JoinError.
        let records = match tokio::task::spawn_blocking(move || extractor.extract(&page)).await {
            Ok(records) => records,
            Err(e) => return Err(run.fail(ScrapeError::Extraction(e.to_string()))),
        };

        if records.is_empty() {
            return Err(run.fail(ScrapeError::Extraction(
                "no product cards could be extracted from the rendered page".to_string(),
            )));
        }

        run.enter(ScrapePhase::Done);
        info!(
            "✅ Scrape finished: {} products in {}ms",
            records.len(),
            run.started.elapsed().as_millis()
        );
        Ok(records)
    }
}
