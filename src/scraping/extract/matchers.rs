//! Card-discovery strategies, tried in priority order by the extractor.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use super::ProductLinks;

pub(super) static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// One way of locating product cards in a rendered document.
pub trait CardMatcher: Send + Sync {
    fn name(&self) -> &str;

    /// All cards this strategy recognizes, in document order. Empty means
    /// "no match" and the extractor moves on to the next strategy.
    fn find_cards<'a>(&self, document: &'a Html, links: &ProductLinks) -> Vec<ElementRef<'a>>;
}

/// Plain CSS-selector strategy.
pub struct SelectorMatcher {
    name: String,
    selector: Selector,
}

impl SelectorMatcher {
    /// `None` when `css` does not parse.
    pub fn new(name: impl Into<String>, css: &str) -> Option<Self> {
        let selector = Selector::parse(css).ok()?;
        Some(Self {
            name: name.into(),
            selector,
        })
    }
}

impl CardMatcher for SelectorMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_cards<'a>(&self, document: &'a Html, _links: &ProductLinks) -> Vec<ElementRef<'a>> {
        document.select(&self.selector).collect()
    }
}

/// Broadest fallback: every anchor that points at a product-detail page.
pub struct ProductLinkMatcher;

impl CardMatcher for ProductLinkMatcher {
    fn name(&self) -> &str {
        "product-links"
    }

    fn find_cards<'a>(&self, document: &'a Html, links: &ProductLinks) -> Vec<ElementRef<'a>> {
        document
            .select(&ANCHOR)
            .filter(|a| {
                a.value()
                    .attr("href")
                    .and_then(|href| links.product_url(href))
                    .is_some()
            })
            .collect()
    }
}

/// Default chain: semantic test attributes, then class-name variants, then
/// any product-detail link.
pub fn default_card_matchers() -> Vec<Box<dyn CardMatcher>> {
    let selector_strategies = [
        (
            "test-attribute",
            "[data-testid*='product-card'], [data-testid*='productCard'], [data-testid='product']",
        ),
        (
            "class-product-card",
            "[class*='product-card'], [class*='productCard'], [class*='ProductCard']",
        ),
        (
            "class-product-item",
            "[class*='product-item'], [class*='productItem'], [class*='ProductItem']",
        ),
        (
            "class-product-tile",
            "[class*='product-tile'], [class*='productTile'], [class*='ProductTile']",
        ),
    ];

    let mut matchers: Vec<Box<dyn CardMatcher>> = Vec::new();
    for (name, css) in selector_strategies {
        match SelectorMatcher::new(name, css) {
            Some(m) => matchers.push(Box::new(m)),
            None => debug!("skipping card strategy {} (selector did not parse)", name),
        }
    }
    matchers.push(Box::new(ProductLinkMatcher));
    matchers
}
