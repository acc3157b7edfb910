//! Drives a real Chromium against a tiny local page. Machines without a
//! browser (or where it cannot start) log and return instead of failing.
//!
//! Run with: cargo test --test live_browser_smoke -- --nocapture

use axum::{response::Html, routing::get, Router};
use catalog_scout::browser_manager::{native_browser_available, ChromeRenderer, RenderSettings};
use catalog_scout::errors::RenderError;
use catalog_scout::scraping::PageRenderer;
use std::time::Duration;

const LAZY_GRID: &str = r#"<!doctype html>
<html><body>
<div id="grid"></div>
<script>
  setTimeout(() => {
    const grid = document.getElementById('grid');
    for (let i = 1; i <= 4; i++) {
      grid.insertAdjacentHTML('beforeend',
        `<div class="product-card"><a href="/product/${i}"><h2>Item ${i}</h2></a>` +
        `<span class="price">${i}9.99</span></div>`);
    }
  }, 300);
</script>
</body></html>"#;

const SPARSE_GRID: &str = r#"<!doctype html>
<html><body>
<div class="product-card"><a href="/product/1"><h2>Only one</h2></a></div>
<div class="product-card"><a href="/product/2"><h2>Only two</h2></a></div>
<a href="mailto:shop@example.com">/product/contact</a>
</body></html>"#;

async fn serve(path: &'static str, body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(path, get(move || async move { Html(body) }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}{}", addr, path)
}

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn renders_script_built_grid() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  No Chromium-family browser found; skipping");
        return;
    }

    let url = serve("/c/all", LAZY_GRID).await;

    let renderer = ChromeRenderer::new(RenderSettings {
        scroll_cycles: 1,
        scroll_pause: Duration::from_millis(200),
        ..RenderSettings::default()
    });

    match renderer.render(&url).await {
        Ok(page) => {
            println!("✅ Rendered {} bytes", page.html.len());
            assert!(page.html.contains("/product/4"));
        }
        Err(e) => println!("⚠️  Render failed (environment?): {}", e),
    }
}

#[tokio::test]
async fn sparse_page_is_content_not_ready() {
    init_logger();
    if !native_browser_available() {
        println!("⚠️  No Chromium-family browser found; skipping");
        return;
    }

    let url = serve("/c/sparse", SPARSE_GRID).await;
    let renderer = ChromeRenderer::new(RenderSettings {
        ready_timeout: Duration::from_secs(2),
        scroll_cycles: 0,
        ..RenderSettings::default()
    });

    match renderer.render(&url).await {
        Ok(page) => panic!("❌ FAIL: rendered {} bytes despite too few product links", page.html.len()),
        Err(e @ (RenderError::LaunchFailure(_) | RenderError::Browser(_) | RenderError::Timeout { .. })) => {
            println!("⚠️  Browser unavailable (environment?): {}", e)
        }
        Err(e) => {
            println!("✅ Readiness rejected sparse page: {}", e);
            assert!(matches!(
                e,
                RenderError::ContentNotReady {
                    found: 2,
                    required: 3
                }
            ));
        }
    }
}
