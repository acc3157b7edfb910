pub mod catalog_cache;
pub mod image_proxy;
pub mod scrape;
