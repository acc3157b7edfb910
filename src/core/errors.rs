use axum::http::StatusCode;
use thiserror::Error;

/// Where a render-phase timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Navigation,
}

impl std::fmt::Display for RenderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderStage::Navigation => f.write_str("navigation"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    LaunchFailure(String),

    #[error("{stage} timed out after {after_ms}ms")]
    Timeout { stage: RenderStage, after_ms: u64 },

    #[error("content not ready: found {found} product links, need at least {required}")]
    ContentNotReady { found: usize, required: usize },

    #[error("browser automation failed: {0}")]
    Browser(String),
}

impl RenderError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RenderError::Timeout { .. } | RenderError::ContentNotReady { .. }
        )
    }
}

/// Failure of one whole scrape attempt. `Clone` so a single outcome can be
/// handed to every caller attached to the in-flight scrape.
#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("scrape task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing required query parameter: url")]
    MissingUrl,

    #[error("invalid image url: {0}")]
    InvalidUrl(String),

    #[error("upstream responded with {0}")]
    Upstream(StatusCode),

    #[error("image fetch failed: {0}")]
    Fetch(String),
}

impl RelayError {
    /// HTTP status reported to the dashboard for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl | RelayError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(status) => *status,
            RelayError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
