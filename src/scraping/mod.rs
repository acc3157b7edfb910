pub mod browser_manager;
pub mod extract;
pub mod stealth;

use crate::core::errors::RenderError;
use crate::types::RenderedPage;
use async_trait::async_trait;

/// Turns a target URL into a rendered DOM snapshot.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}
