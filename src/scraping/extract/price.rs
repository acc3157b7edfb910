//! Price text normalization.
//!
//! Source sites render prices as "amount, separator, currency marker" in
//! whatever order their template uses. The normalizer keeps only the numeric
//! amount and prefixes a fixed currency code. That layout assumption is
//! site-specific, so it sits behind [`PriceNormalizer`] and can be swapped
//! per deployment or in tests.

use regex::Regex;
use std::sync::LazyLock;

use super::collapse_whitespace;

/// Amount = digits, optionally followed by `.`/`,` groups or space-separated
/// thousands groups (`1 299`). Anything after the amount is the separator
/// token and the original marker.
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+|\s\d{3}\b)*").expect("valid amount regex"));

pub trait PriceNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Replaces whatever currency marker the site shows with `code`.
#[derive(Debug, Clone)]
pub struct CurrencyCodeNormalizer {
    code: String,
}

impl CurrencyCodeNormalizer {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

impl PriceNormalizer for CurrencyCodeNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let collapsed = collapse_whitespace(raw);
        match AMOUNT.find(&collapsed) {
            Some(amount) => format!("{} {}", self.code, amount.as_str()),
            // "Free", "Sold out", ... keep the site's wording.
            None => collapsed,
        }
    }
}

/// Leaves the collapsed text untouched.
#[derive(Debug, Clone, Default)]
pub struct PassthroughNormalizer;

impl PriceNormalizer for PassthroughNormalizer {
    fn normalize(&self, raw: &str) -> String {
        collapse_whitespace(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(raw: &str) -> String {
        CurrencyCodeNormalizer::new("USD").normalize(raw)
    }

    #[test]
    fn trailing_marker_is_replaced() {
        assert_eq!(usd("1 299 ₽ / шт"), "USD 1 299");
        assert_eq!(usd("19,99 € / Stück"), "USD 19,99");
    }

    #[test]
    fn leading_marker_is_replaced() {
        assert_eq!(usd("$19.99"), "USD 19.99");
        assert_eq!(usd("Rs.  1,299"), "USD 1,299");
    }

    #[test]
    fn whitespace_is_collapsed_first() {
        assert_eq!(usd("\n   24.50\n\t  EUR  "), "USD 24.50");
    }

    #[test]
    fn separator_stops_the_amount() {
        // A quantity after the separator must not be glued onto the price.
        assert_eq!(usd("19.99 | 2 pcs"), "USD 19.99");
        assert_eq!(usd("19.99 2 pcs"), "USD 19.99");
    }

    #[test]
    fn text_without_digits_is_kept() {
        assert_eq!(usd("  Sold   out "), "Sold out");
    }

    #[test]
    fn passthrough_only_collapses() {
        assert_eq!(PassthroughNormalizer.normalize(" 10  €"), "10 €");
    }
}
