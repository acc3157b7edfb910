//! One-shot scrape of the configured category page, printed as JSON.
//! Useful for tuning card matchers against a live site without the server.

use anyhow::Result;
use catalog_scout::browser_manager::ChromeRenderer;
use catalog_scout::core::config::load_scout_config;
use catalog_scout::extract::Extractor;
use catalog_scout::scrape::{CatalogScraper, ScrapeOrchestrator};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_scout_config();
    let target = match std::env::args().nth(1) {
        Some(arg) => url::Url::parse(&arg)?,
        None => config.resolve_target_url()?,
    };

    let orchestrator = ScrapeOrchestrator::new(
        Arc::new(ChromeRenderer::new(config.render_settings())),
        Extractor::new(config.extract_settings()),
        target.as_str(),
    );

    let started = Instant::now();
    let records = orchestrator.scrape().await?;
    eprintln!(
        "=== {} products from {} in {:.2}s ===",
        records.len(),
        orchestrator.target_url(),
        started.elapsed().as_secs_f64()
    );
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
