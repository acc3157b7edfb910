//! Native browser management using `chromiumoxide`.
//!
//! This module is the single place that:
//! * Finds a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * Builds the headless launch config with stealth defaults.
//! * Owns a browser process for exactly one render via [`RenderSession`].
//! * Implements the render pipeline: navigate → network idle → readiness
//!   predicate → lazy-load scrolling → HTML snapshot.
//!
//! Every render launches its own isolated browser. Nothing is pooled, so a
//! crashed or wedged Chromium never leaks into the next scrape.

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::stealth::stealth_script;
use super::PageRenderer;
use crate::core::errors::{RenderError, RenderStage};
use crate::types::RenderedPage;

// ── Realistic User-Agent pool ────────────────────────────────────────────────

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen realistic Chromium desktop User-Agent string.
///
/// Only Chromium UAs: the page is rendered by Chromium, and a Firefox or
/// Safari identity would contradict the engine's own fingerprint.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `CHROME_EXECUTABLE` env var (explicit override)
/// 2. PATH scan – finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Some(p) = crate::core::config::chrome_executable_override() {
        return Some(p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "brave-browser",
            "brave",
            "google-chrome",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/brave-browser",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Returns `true` when a usable browser binary is present on this machine.
pub fn native_browser_available() -> bool {
    find_chrome_executable().is_some()
}

// ── Render settings ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Bound on `goto` plus the network-idle wait.
    pub navigation_timeout: Duration,
    /// Bound on the readiness predicate.
    pub ready_timeout: Duration,
    pub min_product_links: usize,
    pub scroll_cycles: u32,
    pub scroll_pause: Duration,
    pub product_path_marker: String,
    /// No new resource entries for this long counts as network idle.
    pub quiet_window: Duration,
    pub width: u32,
    pub height: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            ready_timeout: Duration::from_secs(15),
            min_product_links: 3,
            scroll_cycles: 3,
            scroll_pause: Duration::from_millis(1_000),
            product_path_marker: "/product".to_string(),
            quiet_window: Duration::from_millis(500),
            width: 1920,
            height: 1080,
        }
    }
}

// ── Headless browser config builder ──────────────────────────────────────────

/// Build a `BrowserConfig` for headless operation with stealth defaults.
///
/// `--disable-blink-features=AutomationControlled` hides the
/// `navigator.webdriver` flag; `--no-sandbox` / `--disable-dev-shm-usage`
/// keep Chromium alive in containers.
pub fn build_headless_config(
    exe: &str,
    user_agent: &str,
    settings: &RenderSettings,
) -> Result<BrowserConfig, RenderError> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width: settings.width,
            height: settings.height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(settings.width, settings.height)
        .request_timeout(settings.navigation_timeout)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", user_agent))
        .build()
        .map_err(|e| RenderError::LaunchFailure(format!("invalid browser config: {}", e)))
}

// ── Scoped browser session ───────────────────────────────────────────────────

/// One launched browser plus its CDP event loop.
///
/// Call [`RenderSession::close`] when done. If the session is dropped
/// instead (panic, cancelled task), `Drop` closes the browser in the
/// background so no Chromium process outlives its scrape.
pub struct RenderSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    user_agent: &'static str,
}

impl RenderSession {
    pub async fn launch(exe: &str, settings: &RenderSettings) -> Result<Self, RenderError> {
        let user_agent = random_user_agent();
        let config = build_headless_config(exe, user_agent, settings)?;

        info!("🚀 Launching headless browser ({})", exe);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::LaunchFailure(format!("{} ({})", e, exe)))?;

        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler: Some(handle),
            user_agent,
        })
    }

    /// Fresh tab with the stealth script and the session's User-Agent applied.
    pub async fn open_page(&self) -> Result<Page, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Browser("session already closed".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Browser(format!("failed to open tab: {}", e)))?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(stealth_script()))
            .await
            .map_err(|e| RenderError::Browser(format!("failed to inject stealth script: {}", e)))?;

        page.set_user_agent(self.user_agent)
            .await
            .map_err(|e| RenderError::Browser(format!("failed to set user agent: {}", e)))?;

        Ok(page)
    }

    pub async fn close(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        debug!("Render session closed");
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        let handler = self.handler.take();
        let Some(mut browser) = self.browser.take() else {
            if let Some(h) = handler {
                h.abort();
            }
            return;
        };

        warn!("Render session dropped before close; closing browser in background");
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                // The CDP handler must keep running until the close command is acknowledged.
                rt.spawn(async move {
                    let _ = browser.close().await;
                    if let Some(h) = handler {
                        h.abort();
                    }
                });
            }
            Err(_) => {
                if let Some(h) = handler {
                    h.abort();
                }
                // chromiumoxide kills the child process when the Browser is dropped.
                drop(browser);
            }
        }
    }
}

// ── Render pipeline ──────────────────────────────────────────────────────────

/// The page operations the render pipeline needs. Implemented for
/// chromiumoxide's [`Page`]; tests drive the pipeline with a scripted fake.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), CdpError>;

    /// `(resource timing entry count, document.readyState == "complete")`.
    async fn load_state(&self) -> (u64, bool);

    /// Number of `http(s)` anchors whose path contains `marker`.
    async fn product_link_count(&self, marker: &str) -> usize;

    async fn scroll_one_viewport(&self) -> Result<(), CdpError>;
}

fn product_link_count_script(marker: &str) -> String {
    let marker = serde_json::Value::String(marker.to_string());
    format!(
        "Array.from(document.querySelectorAll('a[href]')).filter(a => {{ \
           try {{ \
             const raw = (a.getAttribute('href') || '').trim(); \
             if (!raw || raw.startsWith('#') || !/^https?:/.test(a.href)) return false; \
             return new URL(a.href, location.href).pathname.includes({marker}); \
           }} catch (e) {{ return false; }} \
         }}).length"
    )
}

async fn evaluate_json(page: &Page, script: &str) -> Option<serde_json::Value> {
    page.evaluate(script)
        .await
        .ok()
        .and_then(|v| v.into_value::<serde_json::Value>().ok())
}

#[async_trait]
impl PageDriver for Page {
    async fn goto(&self, url: &str) -> Result<(), CdpError> {
        Page::goto(self, url).await.map(|_| ())
    }

    async fn load_state(&self) -> (u64, bool) {
        let count = evaluate_json(self, "performance.getEntriesByType('resource').length")
            .await
            .and_then(|j| j.as_u64())
            .unwrap_or(0);
        let complete = evaluate_json(self, "document.readyState")
            .await
            .and_then(|j| j.as_str().map(|s| s == "complete"))
            .unwrap_or(false);
        (count, complete)
    }

    async fn product_link_count(&self, marker: &str) -> usize {
        evaluate_json(self, &product_link_count_script(marker))
            .await
            .and_then(|j| j.as_u64())
            .unwrap_or(0) as usize
    }

    async fn scroll_one_viewport(&self) -> Result<(), CdpError> {
        self.evaluate("window.scrollBy(0, window.innerHeight);")
            .await
            .map(|_| ())
    }
}

/// Wait until no new resource entries have appeared for `quiet` while the
/// document is complete. Unbounded; callers wrap it in a timeout.
///
/// Polls `performance.getEntriesByType("resource").length` every 250 ms,
/// a networkidle heuristic that works without CDP Network events.
pub async fn wait_until_stable<P: PageDriver + ?Sized>(page: &P, quiet: Duration) {
    let poll = Duration::from_millis(250);
    let start = Instant::now();
    let mut last_count: u64 = 0;
    let mut stable_since = Instant::now();

    loop {
        let (count, ready_complete) = page.load_state().await;

        if !ready_complete || count != last_count {
            last_count = count;
            stable_since = Instant::now();
        } else if stable_since.elapsed() >= quiet {
            debug!(
                "wait_until_stable: idle after {}ms ({} resources)",
                start.elapsed().as_millis(),
                count
            );
            return;
        }

        tokio::time::sleep(poll).await;
    }
}

async fn navigate<P: PageDriver + ?Sized>(
    page: &P,
    url: &str,
    settings: &RenderSettings,
) -> Result<(), RenderError> {
    let timed_out = || RenderError::Timeout {
        stage: RenderStage::Navigation,
        after_ms: settings.navigation_timeout.as_millis() as u64,
    };

    let navigation = async {
        page.goto(url).await.map_err(|e| match e {
            CdpError::Timeout => timed_out(),
            other => RenderError::Browser(format!("navigation to {} failed: {}", url, other)),
        })?;
        wait_until_stable(page, settings.quiet_window).await;
        Ok::<(), RenderError>(())
    };

    tokio::time::timeout(settings.navigation_timeout, navigation)
        .await
        .map_err(|_| timed_out())?
}

/// Readiness predicate: at least `min_product_links` product-detail links.
async fn wait_for_product_links<P: PageDriver + ?Sized>(
    page: &P,
    settings: &RenderSettings,
) -> Result<(), RenderError> {
    let deadline = Instant::now() + settings.ready_timeout;

    loop {
        let found = page.product_link_count(&settings.product_path_marker).await;
        if found >= settings.min_product_links {
            info!("Readiness predicate met: {} product links", found);
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RenderError::ContentNotReady {
                found,
                required: settings.min_product_links,
            });
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Fixed scroll-and-wait cycles to trigger lazy-loaded cards.
async fn scroll_for_lazy_content<P: PageDriver + ?Sized>(page: &P, settings: &RenderSettings) {
    for i in 0..settings.scroll_cycles {
        if let Err(e) = page.scroll_one_viewport().await {
            warn!("scroll cycle {} error: {}", i, e);
        }
        tokio::time::sleep(settings.scroll_pause).await;
    }
}

/// Headless-Chromium implementation of [`PageRenderer`].
pub struct ChromeRenderer {
    settings: RenderSettings,
}

impl ChromeRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    async fn capture(&self, session: &RenderSession, url: &str) -> Result<RenderedPage, RenderError> {
        let page = session.open_page().await?;

        info!("🌐 Navigating to: {}", url);
        navigate(&page, url, &self.settings).await?;
        wait_for_product_links(&page, &self.settings).await?;
        scroll_for_lazy_content(&page, &self.settings).await;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Browser(format!("failed to get page content: {}", e)))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        info!("✅ Rendered {} ({} chars)", final_url, html.len());
        Ok(RenderedPage {
            url: final_url,
            html,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let exe = find_chrome_executable().ok_or_else(|| {
            RenderError::LaunchFailure(
                "No browser found. Install Brave, Chrome, or Chromium. Set CHROME_EXECUTABLE if installed in a non-standard location.".to_string(),
            )
        })?;

        let session = RenderSession::launch(&exe, &self.settings).await?;
        let result = self.capture(&session, url).await;
        session.close().await;
        result
    }
}
