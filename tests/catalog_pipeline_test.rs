//! Whole pipeline behind the HTTP surface, with a canned page instead of a
//! live browser.

use async_trait::async_trait;
use catalog_scout::catalog_cache::{CatalogCache, ManualClock};
use catalog_scout::errors::RenderError;
use catalog_scout::extract::{ExtractSettings, Extractor};
use catalog_scout::image_proxy::ImageRelay;
use catalog_scout::scrape::{CatalogScraper, ScrapeOrchestrator};
use catalog_scout::scraping::PageRenderer;
use catalog_scout::{api, AppState, RenderedPage};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;

const CATEGORY: &str = "https://shop.example.com/c/phones";

const CATEGORY_HTML: &str = r#"
<html><body>
  <nav><a href="/about">About</a></nav>
  <div class="product-card">
    <a href="/product/aurora-x?ref=grid#reviews">
      <img data-src="//cdn.example.com/aurora.jpg" src="data:image/gif;base64,R0lGOD">
      <h3> Aurora   X </h3>
    </a>
    <span class="product-price">1.299,00 &nbsp;₺</span>
  </div>
  <div class="product-card">
    <a href="https://shop.example.com/product/nebula"><img src="/img/nebula.png"></a>
    <div class="name">Nebula</div>
  </div>
  <div class="product-card">
    <a href="/product/aurora-x?ref=grid"><h3>Aurora X duplicate</h3></a>
    <span class="price">1.299,00 ₺</span>
  </div>
</body></html>
"#;

struct CannedRenderer {
    html: Mutex<Result<String, RenderError>>,
    calls: AtomicUsize,
}

impl CannedRenderer {
    fn new(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Mutex::new(Ok(html.to_string())),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, outcome: Result<String, RenderError>) {
        *self.html.lock().unwrap() = outcome;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for CannedRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let html = self.html.lock().unwrap().clone()?;
        Ok(RenderedPage {
            url: url.to_string(),
            html,
        })
    }
}

fn orchestrator(renderer: Arc<CannedRenderer>) -> ScrapeOrchestrator {
    ScrapeOrchestrator::new(
        renderer,
        Extractor::new(ExtractSettings::new("/product", "TRY")),
        CATEGORY,
    )
}

#[tokio::test]
async fn category_page_becomes_dense_deduplicated_records() {
    let records = assert_ok!(orchestrator(CannedRenderer::new(CATEGORY_HTML)).scrape().await);

    assert_eq!(records.len(), 2);

    let aurora = &records[0];
    assert_eq!(aurora.id, 1);
    assert_eq!(aurora.title, "Aurora X");
    assert_eq!(aurora.price, "TRY 1.299,00");
    assert_eq!(aurora.image, "https://cdn.example.com/aurora.jpg");
    assert_eq!(aurora.url, "https://shop.example.com/product/aurora-x?ref=grid");

    let nebula = &records[1];
    assert_eq!(nebula.id, 2);
    assert_eq!(nebula.title, "Nebula");
    assert_eq!(nebula.price, "N/A");
    assert_eq!(nebula.image, "https://shop.example.com/img/nebula.png");
}

#[tokio::test]
async fn cache_serves_within_ttl_and_rescrapes_after() {
    let renderer = CannedRenderer::new(CATEGORY_HTML);
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    ));
    let cache = CatalogCache::with_clock(
        Arc::new(orchestrator(renderer.clone())),
        Duration::from_secs(300),
        clock.clone(),
    );

    let first = assert_ok!(cache.get_or_scrape().await);
    assert!(!first.served_from_cache);
    assert_eq!(renderer.calls(), 1);

    clock.advance(Duration::from_secs(299));
    let second = assert_ok!(cache.get_or_scrape().await);
    assert!(second.served_from_cache);
    assert_eq!(renderer.calls(), 1);

    clock.advance(Duration::from_secs(2));
    let third = assert_ok!(cache.get_or_scrape().await);
    assert!(!third.served_from_cache);
    assert_eq!(renderer.calls(), 2);
}

#[tokio::test]
async fn burst_of_requests_launches_one_render() {
    let renderer = CannedRenderer::new(CATEGORY_HTML);
    let cache = CatalogCache::new(
        Arc::new(orchestrator(renderer.clone())),
        Duration::from_secs(300),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_scrape().await })
        })
        .collect();

    for handle in handles {
        let snapshot = assert_ok!(handle.await.unwrap());
        assert_eq!(snapshot.records.len(), 2);
    }
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_serving_previous_list() {
    let renderer = CannedRenderer::new(CATEGORY_HTML);
    let cache = CatalogCache::new(
        Arc::new(orchestrator(renderer.clone())),
        Duration::from_secs(300),
    );
    assert_ok!(cache.force_scrape().await);

    renderer.set(Err(RenderError::LaunchFailure("chromium crashed".into())));
    let err = cache.force_scrape().await.unwrap_err();
    assert!(err.to_string().contains("chromium crashed"));

    let snapshot = assert_ok!(cache.get_or_scrape().await);
    assert!(snapshot.served_from_cache);
    assert_eq!(snapshot.records.len(), 2);
}

#[tokio::test]
async fn http_surface_end_to_end() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let renderer = CannedRenderer::new(CATEGORY_HTML);
    let cache = CatalogCache::new(
        Arc::new(orchestrator(renderer.clone())),
        Duration::from_secs(300),
    );
    let relay = ImageRelay::new(reqwest::Client::new(), "https://shop.example.com/");
    let app = api::router(Arc::new(AppState::new(cache, relay)));

    let response = app
        .clone()
        .oneshot(Request::get("/api/products").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);
    assert_eq!(json["cached"], false);
    assert_eq!(json["products"][1]["price"], "N/A");

    let response = app
        .oneshot(Request::get("/api/products/refresh").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(renderer.calls(), 2);
}
