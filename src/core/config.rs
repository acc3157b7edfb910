use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::scraping::browser_manager::RenderSettings;
use crate::scraping::extract::ExtractSettings;

// ---------------------------------------------------------------------------
// ScoutConfig: file-based config loader (catalog-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "CATALOG_SCOUT_CONFIG";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_TARGET_URL: &str = "SCOUT_TARGET_URL";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Top-level config loaded from `catalog-scout.json`.
///
/// Every field is optional; the `resolve_*` accessors fall back to an
/// environment variable and then to a built-in default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// Category page to scrape. Required (JSON or `SCOUT_TARGET_URL`).
    pub target_url: Option<String>,
    pub port: Option<u16>,
    pub cache_ttl_secs: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub ready_timeout_ms: Option<u64>,
    /// Readiness predicate: minimum product-detail links before extraction.
    pub min_product_links: Option<usize>,
    pub scroll_cycles: Option<u32>,
    pub scroll_pause_ms: Option<u64>,
    /// Path fragment that identifies a product-detail URL, e.g. `/product`.
    pub product_path_marker: Option<String>,
    /// Currency code prefixed onto normalized prices.
    pub currency_code: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ScoutConfig {
    /// Target URL: JSON field → `SCOUT_TARGET_URL`. No default; the service
    /// has nothing to scrape without one.
    pub fn resolve_target_url(&self) -> Result<Url> {
        let raw = non_empty(&self.target_url)
            .or_else(|| env_string(ENV_TARGET_URL))
            .ok_or_else(|| {
                anyhow!(
                    "No target URL configured. Set `target_url` in catalog-scout.json or the {} env var.",
                    ENV_TARGET_URL
                )
            })?;
        let url = Url::parse(&raw).map_err(|e| anyhow!("Invalid target URL '{}': {}", raw, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("Target URL must be http(s): {}", raw));
        }
        Ok(url)
    }

    /// Listening port: JSON field → `PORT` → 3001.
    pub fn resolve_port(&self) -> u16 {
        self.port
            .or_else(|| env_parse(ENV_PORT))
            .unwrap_or(DEFAULT_PORT)
    }

    /// Cache TTL: JSON field → `SCOUT_CACHE_TTL_SECS` → 300s.
    pub fn resolve_cache_ttl(&self) -> Duration {
        let secs = self
            .cache_ttl_secs
            .or_else(|| env_parse("SCOUT_CACHE_TTL_SECS"))
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);
        Duration::from_secs(secs)
    }

    pub fn resolve_navigation_timeout(&self) -> Duration {
        let ms = self
            .navigation_timeout_ms
            .or_else(|| env_parse("SCOUT_NAVIGATION_TIMEOUT_MS"))
            .unwrap_or(60_000);
        Duration::from_millis(ms)
    }

    pub fn resolve_ready_timeout(&self) -> Duration {
        let ms = self
            .ready_timeout_ms
            .or_else(|| env_parse("SCOUT_READY_TIMEOUT_MS"))
            .unwrap_or(15_000);
        Duration::from_millis(ms)
    }

    pub fn resolve_min_product_links(&self) -> usize {
        self.min_product_links
            .or_else(|| env_parse("SCOUT_MIN_PRODUCT_LINKS"))
            .unwrap_or(3)
    }

    pub fn resolve_scroll_cycles(&self) -> u32 {
        self.scroll_cycles
            .or_else(|| env_parse("SCOUT_SCROLL_CYCLES"))
            .unwrap_or(3)
    }

    pub fn resolve_scroll_pause(&self) -> Duration {
        let ms = self
            .scroll_pause_ms
            .or_else(|| env_parse("SCOUT_SCROLL_PAUSE_MS"))
            .unwrap_or(1_000);
        Duration::from_millis(ms)
    }

    pub fn resolve_product_path_marker(&self) -> String {
        non_empty(&self.product_path_marker)
            .or_else(|| env_string("SCOUT_PRODUCT_PATH_MARKER"))
            .unwrap_or_else(|| "/product".to_string())
    }

    pub fn resolve_currency_code(&self) -> String {
        non_empty(&self.currency_code)
            .or_else(|| env_string("SCOUT_CURRENCY_CODE"))
            .unwrap_or_else(|| "USD".to_string())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            navigation_timeout: self.resolve_navigation_timeout(),
            ready_timeout: self.resolve_ready_timeout(),
            min_product_links: self.resolve_min_product_links(),
            scroll_cycles: self.resolve_scroll_cycles(),
            scroll_pause: self.resolve_scroll_pause(),
            product_path_marker: self.resolve_product_path_marker(),
            ..RenderSettings::default()
        }
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        ExtractSettings::new(
            self.resolve_product_path_marker(),
            self.resolve_currency_code(),
        )
    }
}

/// Load `catalog-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `CATALOG_SCOUT_CONFIG` env var path
/// 2. `./catalog-scout.json`
/// 3. `../catalog-scout.json`
///
/// Missing file → `ScoutConfig::default()` (env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("catalog-scout.json"),
        std::path::PathBuf::from("../catalog-scout.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<ScoutConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("catalog-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "catalog-scout.json parse error at {}: {} (using defaults)",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}

/// Optional override for the Chromium-family browser executable.
///
/// Only returns a value when `CHROME_EXECUTABLE` is set to an existing path;
/// otherwise `browser_manager::find_chrome_executable()` auto-discovers one.
pub fn chrome_executable_override() -> Option<String> {
    let p = std::env::var(ENV_CHROME_EXECUTABLE).ok()?;
    let p = p.trim();
    if p.is_empty() {
        return None;
    }
    if Path::new(p).exists() {
        Some(p.to_string())
    } else {
        None
    }
}
