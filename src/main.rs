use std::env;
use std::sync::Arc;
use tracing::{info, warn};

use catalog_scout::browser_manager::native_browser_available;
use catalog_scout::core::config::load_scout_config;
use catalog_scout::{api, AppState};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn env_secs(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting catalog-scout");

    let config = load_scout_config();

    if !native_browser_available() {
        warn!(
            "No Chromium-family browser found; scrapes will fail until one is installed or CHROME_EXECUTABLE is set"
        );
    }

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(env_secs("HTTP_TIMEOUT_SECS", 30)))
        .connect_timeout(std::time::Duration::from_secs(env_secs(
            "HTTP_CONNECT_TIMEOUT_SECS",
            10,
        )))
        .build()?;

    let state = Arc::new(AppState::from_config(&config, http_client)?);
    info!(
        "Catalog target: {} (cache TTL {}s)",
        config.resolve_target_url()?,
        config.resolve_cache_ttl().as_secs()
    );

    let app = api::router(state);

    let port = parse_port_from_args().unwrap_or_else(|| config.resolve_port());
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("🚀 catalog-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}
