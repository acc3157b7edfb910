pub mod api;
pub mod core;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::errors;
pub use core::types;
pub use core::types::*;
pub use core::AppState;

pub use scraping::{browser_manager, extract};
pub use tools::{catalog_cache, image_proxy, scrape};
