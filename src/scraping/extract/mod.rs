//! Heuristic product extraction over a rendered category page.
//!
//! Pure over the DOM: no I/O, deterministic for a fixed document, never
//! fails. Missing fields degrade to [`NOT_AVAILABLE`] or an empty string;
//! a card is only dropped when its URL was already seen or when neither a
//! title nor a price could be recovered.

mod matchers;
mod price;

pub use matchers::{default_card_matchers, CardMatcher, ProductLinkMatcher, SelectorMatcher};
pub use price::{CurrencyCodeNormalizer, PassthroughNormalizer, PriceNormalizer};

use crate::types::{ProductRecord, RenderedPage, NOT_AVAILABLE};
use matchers::ANCHOR;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use url::Url;

static IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid img selector"));
static H2: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("valid h2 selector"));
static H3: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3").expect("valid h3 selector"));
static H4: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h4").expect("valid h4 selector"));

/// Lazy-load attributes checked when `src` is missing or a placeholder.
const LAZY_IMAGE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original"];

#[derive(Clone)]
pub struct ExtractSettings {
    pub product_path_marker: String,
    pub price_normalizer: Arc<dyn PriceNormalizer>,
}

impl ExtractSettings {
    pub fn new(product_path_marker: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Self {
            product_path_marker: product_path_marker.into(),
            price_normalizer: Arc::new(CurrencyCodeNormalizer::new(currency_code)),
        }
    }

    pub fn with_price_normalizer(mut self, normalizer: Arc<dyn PriceNormalizer>) -> Self {
        self.price_normalizer = normalizer;
        self
    }
}

impl std::fmt::Debug for ExtractSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractSettings")
            .field("product_path_marker", &self.product_path_marker)
            .finish_non_exhaustive()
    }
}

/// Resolves hrefs against the page URL and decides which ones are
/// product-detail links.
#[derive(Debug, Clone)]
pub struct ProductLinks {
    base: Option<Url>,
    marker: String,
}

impl ProductLinks {
    pub fn new(base: Option<Url>, marker: impl Into<String>) -> Self {
        Self {
            base,
            marker: marker.into(),
        }
    }

    fn absolutize(&self, raw: &str) -> Option<Url> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") {
            return None;
        }
        match &self.base {
            Some(base) => base.join(raw).ok(),
            None => Url::parse(raw).ok(),
        }
    }

    /// Canonical product-detail URL for `href`, or `None` when it is not one.
    pub fn product_url(&self, href: &str) -> Option<String> {
        let mut url = self.absolutize(href)?;
        if !matches!(url.scheme(), "http" | "https") || !url.path().contains(&self.marker) {
            return None;
        }
        url.set_fragment(None);
        Some(url.to_string())
    }

    /// Absolute image URL. Protocol-relative values get an explicit scheme.
    fn image_url(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return None;
        }
        if let Some(rest) = raw.strip_prefix("//") {
            return Some(format!("https://{}", rest));
        }
        self.absolutize(raw)
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .map(|url| url.to_string())
    }
}

/// One field lookup inside a card.
enum FieldLookup {
    Tag(&'static LazyLock<Selector>),
    ClassContains(&'static str),
    TestIdContains(&'static str),
}

static TITLE_LOOKUPS: &[FieldLookup] = &[
    FieldLookup::Tag(&H2),
    FieldLookup::Tag(&H3),
    FieldLookup::Tag(&H4),
    FieldLookup::ClassContains("title"),
    FieldLookup::ClassContains("name"),
];

static PRICE_LOOKUPS: &[FieldLookup] = &[
    FieldLookup::TestIdContains("price"),
    FieldLookup::ClassContains("price"),
];

impl FieldLookup {
    fn first_text(&self, card: ElementRef<'_>) -> Option<String> {
        let non_empty = |el: ElementRef<'_>| {
            let text = element_text(el);
            (!text.is_empty()).then_some(text)
        };
        match self {
            FieldLookup::Tag(selector) => card.select(selector).find_map(non_empty),
            FieldLookup::ClassContains(pattern) => {
                descendants_with_attr(card, "class", *pattern).find_map(non_empty)
            }
            FieldLookup::TestIdContains(pattern) => {
                descendants_with_attr(card, "data-testid", *pattern).find_map(non_empty)
            }
        }
    }
}

/// Descendants (not the card itself) whose `attr` contains `pattern`,
/// case-insensitively.
fn descendants_with_attr<'a>(
    card: ElementRef<'a>,
    attr: &'static str,
    pattern: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    card.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |el| {
            el.value()
                .attr(attr)
                .is_some_and(|v| v.to_ascii_lowercase().contains(pattern))
        })
}

fn first_match(card: ElementRef<'_>, lookups: &[FieldLookup]) -> Option<String> {
    lookups.iter().find_map(|lookup| lookup.first_text(card))
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct Extractor {
    settings: ExtractSettings,
    matchers: Vec<Box<dyn CardMatcher>>,
}

impl Extractor {
    pub fn new(settings: ExtractSettings) -> Self {
        Self {
            settings,
            matchers: default_card_matchers(),
        }
    }

    /// Replace the card-discovery chain.
    pub fn with_matchers(mut self, matchers: Vec<Box<dyn CardMatcher>>) -> Self {
        self.matchers = matchers;
        self
    }

    pub fn extract(&self, page: &RenderedPage) -> Vec<ProductRecord> {
        let document = Html::parse_document(&page.html);
        let links = ProductLinks::new(
            Url::parse(&page.url).ok(),
            self.settings.product_path_marker.clone(),
        );

        let Some((strategy, cards)) = self.matchers.iter().find_map(|m| {
            let cards = m.find_cards(&document, &links);
            (!cards.is_empty()).then(|| (m.name(), cards))
        }) else {
            info!("No product cards found on {}", page.url);
            return Vec::new();
        };

        info!("Card strategy '{}' matched {} candidates", strategy, cards.len());

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for card in cards {
            let Some(url) = resolve_product_url(card, &links) else {
                continue;
            };
            if !seen.insert(url.clone()) {
                continue;
            }

            let title = first_match(card, TITLE_LOOKUPS);
            let price = first_match(card, PRICE_LOOKUPS)
                .map(|raw| self.settings.price_normalizer.normalize(&raw))
                .filter(|p| !p.is_empty());

            if title.is_none() && price.is_none() {
                debug!("Dropping card without title or price: {}", url);
                continue;
            }

            records.push(ProductRecord {
                id: records.len() + 1,
                title: title.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                price: price.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                image: extract_image(card, &links).unwrap_or_default(),
                url,
            });
        }

        info!("Extracted {} products from {}", records.len(), page.url);
        records
    }
}

/// The card itself when it is a link, else the first product link inside it,
/// else the nearest `<a>` wrapping it.
fn resolve_product_url(card: ElementRef<'_>, links: &ProductLinks) -> Option<String> {
    if card.value().name() == "a" {
        return card.value().attr("href").and_then(|h| links.product_url(h));
    }

    let inner = card
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|h| links.product_url(h));
    if inner.is_some() {
        return inner;
    }

    card.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .and_then(|h| links.product_url(h))
}

fn extract_image(card: ElementRef<'_>, links: &ProductLinks) -> Option<String> {
    card.select(&IMG).find_map(|img| {
        let el = img.value();
        el.attr("src")
            .and_then(|src| links.image_url(src))
            .or_else(|| {
                LAZY_IMAGE_ATTRS
                    .iter()
                    .find_map(|attr| el.attr(attr).and_then(|v| links.image_url(v)))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://shop.example.com/c/phones";

    fn extract(html: &str) -> Vec<ProductRecord> {
        let extractor = Extractor::new(ExtractSettings::new("/product", "USD"));
        extractor.extract(&RenderedPage {
            url: PAGE_URL.to_string(),
            html: html.to_string(),
        })
    }

    #[test]
    fn duplicate_urls_keep_first_card() {
        let records = extract(
            r#"
            <div data-testid="product-card"><a href="/product/1"><h2>First</h2></a></div>
            <div data-testid="product-card"><a href="/product/1#reviews"><h2>Again</h2></a></div>
            <div data-testid="product-card"><a href="/product/2"><h2>Second</h2></a></div>
            "#,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "First");
        assert_eq!(records[0].url, "https://shop.example.com/product/1");
        assert_eq!(records[1].title, "Second");
        assert_eq!(records[1].id, 2);
    }

    #[test]
    fn card_without_title_and_price_is_absent() {
        let records = extract(
            r#"
            <div class="product-card"><a href="/product/1"><img src="/a.jpg"></a></div>
            <div class="product-card"><a href="/product/2"><span class="price">$5.00</span></a></div>
            <div class="product-card"><a href="/product/3"><h3>Only a title</h3></a></div>
            "#,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].title, NOT_AVAILABLE);
        assert_eq!(records[0].price, "USD 5.00");
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].title, "Only a title");
        assert_eq!(records[1].price, NOT_AVAILABLE);
    }

    #[test]
    fn protocol_relative_image_gets_https() {
        let records = extract(
            r#"<div data-testid="product-card">
                 <a href="/product/1"><img src="//cdn.example.com/x.jpg"><h2>Phone</h2></a>
               </div>"#,
        );
        assert_eq!(records[0].image, "https://cdn.example.com/x.jpg");
    }

    #[test]
    fn lazy_image_attribute_used_when_src_is_placeholder() {
        let records = extract(
            r#"<div data-testid="product-card">
                 <a href="/product/1">
                   <img src="data:image/gif;base64,R0lGOD" data-src="/img/1.webp">
                   <h2>Phone</h2>
                 </a>
               </div>"#,
        );
        assert_eq!(records[0].image, "https://shop.example.com/img/1.webp");
    }

    #[test]
    fn missing_image_is_empty_string() {
        let records = extract(r#"<a class="product-card" href="/product/9"><h4>Case</h4></a>"#);
        assert_eq!(records[0].image, "");
    }

    #[test]
    fn first_matching_strategy_wins() {
        // Both a test-attribute card and a class-pattern card exist; only the
        // test-attribute one may be used.
        let records = extract(
            r#"
            <div data-testid="product-card"><a href="/product/1"><h2>Semantic</h2></a></div>
            <div class="product-card"><a href="/product/2"><h2>By class</h2></a></div>
            "#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Semantic");
    }

    #[test]
    fn falls_back_to_product_links() {
        let records = extract(
            r#"
            <ul>
              <li><a href="/product/7"><div class="item-name">Seven</div></a></li>
              <li><a href="/help">Help</a></li>
              <li><a href="/product/8"><div class="cost"><span class="Price">12 €</span></div></a></li>
            </ul>
            "#,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Seven");
        assert_eq!(records[1].price, "USD 12");
    }

    #[test]
    fn title_priority_prefers_h2_over_class() {
        let records = extract(
            r#"<div data-testid="product-card">
                 <a href="/product/1">
                   <span class="product-title">Class title</span>
                   <h3>Heading three</h3>
                   <h2>  Heading
                         two </h2>
                 </a>
               </div>"#,
        );
        assert_eq!(records[0].title, "Heading two");
    }

    #[test]
    fn card_wrapped_by_link_resolves_outer_anchor() {
        let records = extract(
            r#"<a href="/product/42?ref=grid">
                 <div class="ProductTile"><h2>Wrapped</h2></div>
               </a>"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "https://shop.example.com/product/42?ref=grid");
    }

    #[test]
    fn card_linking_outside_product_pages_is_rejected() {
        let records = extract(
            r#"<div data-testid="product-card"><a href="/promo/summer"><h2>Promo</h2></a></div>
               <div data-testid="product-card"><a href="/product/1"><h2>Real</h2></a></div>"#,
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Real");
    }

    #[test]
    fn price_testid_beats_price_class() {
        let records = extract(
            r#"<div data-testid="product-card">
                 <a href="/product/1">
                   <h2>Phone</h2>
                   <s class="old-price">$30.00</s>
                   <b data-testid="current-price">$25.00</b>
                 </a>
               </div>"#,
        );
        assert_eq!(records[0].price, "USD 25.00");
    }

    #[test]
    fn price_normalizer_is_replaceable() {
        let settings = ExtractSettings::new("/product", "USD")
            .with_price_normalizer(Arc::new(PassthroughNormalizer));
        let records = Extractor::new(settings).extract(&RenderedPage {
            url: PAGE_URL.to_string(),
            html: r#"<div data-testid="product-card"><a href="/product/1">
                       <span class="price">1 299  ₽</span></a></div>"#
                .to_string(),
        });
        assert_eq!(records[0].price, "1 299 ₽");
    }

    #[test]
    fn no_cards_yields_empty_list() {
        assert!(extract("<html><body><p>Nothing here</p></body></html>").is_empty());
    }

    #[test]
    fn image_that_cannot_be_made_absolute_is_dropped() {
        let records = extract(
            r#"<div data-testid="product-card"><a href="/product/1">
                 <img src="javascript:void(0)" data-src="/img/real.jpg"><h2>A</h2></a></div>
               <div data-testid="product-card"><a href="/product/2">
                 <img src="mailto:someone@example.com"><h2>B</h2></a></div>"#,
        );
        assert_eq!(records[0].image, "https://shop.example.com/img/real.jpg");
        assert_eq!(records[1].image, "");

        let unanchored = ProductLinks::new(None, "/product");
        assert_eq!(unanchored.image_url("not a url"), None);
        assert_eq!(unanchored.image_url("/relative.jpg"), None);
    }
}
