//! Turning listing text into typed fields.
//!
//! Every parser here degrades to a default instead of failing: a missing or
//! garbled field never costs the whole product.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::{CATEGORY_SEPARATOR, UNKNOWN_BRAND};

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+)").expect("valid rating regex"));

const BRAND_PREFIXES: [&str; 2] = ["Brand: ", "Visit the "];
const BRAND_SUFFIX: &str = " Store";

/// Parse a price such as `"$1,299.99"` by keeping digits and dots only.
///
/// Returns `0.0` for empty or unparseable text.
#[must_use]
pub fn parse_price(text: &str) -> f64 {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0)
}

/// Current and original price; the original falls back to the parsed
/// current price when the card shows no struck-through price.
#[must_use]
pub fn parse_price_pair(current: Option<&str>, original: Option<&str>) -> (f64, f64) {
    let price = current.map_or(0.0, parse_price);
    let original_price = original.map_or(price, parse_price);
    (price, original_price)
}

/// Whole-percent discount of `price` against `original_price`, in `0..=100`.
///
/// Zero when there is no original price or it does not exceed `price`.
#[must_use]
pub fn discount_percent(price: f64, original_price: f64) -> u8 {
    if !(original_price > 0.0) || original_price <= price {
        return 0;
    }
    let percent = ((original_price - price) / original_price * 100.0).floor();
    // Clamped, so the cast cannot truncate.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let percent = percent.clamp(0.0, 100.0) as u8;
    percent
}

/// First `digits.digits` number in a label like `"4.5 out of 5 stars"`,
/// clamped to `[0, 5]`; `0.0` when there is none.
#[must_use]
pub fn parse_rating(text: &str) -> f64 {
    RATING_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map_or(0.0, |rating| rating.clamp(0.0, 5.0))
}

/// Review count from text like `"(1,234)"`; `0` when there are no digits.
#[must_use]
pub fn parse_review_count(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Brand name from a detail-page byline such as `"Visit the Acme Store"`.
#[must_use]
pub fn clean_brand(byline: &str) -> String {
    let mut brand = byline.trim().to_string();
    if brand.chars().count() <= 1 {
        return UNKNOWN_BRAND.to_string();
    }
    for prefix in BRAND_PREFIXES {
        brand = brand.replace(prefix, "");
    }
    brand = brand.replace(BRAND_SUFFIX, "");
    let brand = brand.trim();
    if brand.is_empty() {
        UNKNOWN_BRAND.to_string()
    } else {
        brand.to_string()
    }
}

/// Resolve `href` against `base`, returning `None` for blank or unusable links.
#[must_use]
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// `"<parent> > <child>"`, or `None` if either segment is blank.
#[must_use]
pub fn category_path(parent: &str, child: &str) -> Option<String> {
    let parent = parent.trim();
    let child = child.trim();
    if parent.is_empty() || child.is_empty() {
        return None;
    }
    Some(format!("{parent}{CATEGORY_SEPARATOR}{child}"))
}

/// `true` if `name` is a two-level path with non-empty segments.
#[must_use]
pub fn is_category_path(name: &str) -> bool {
    match name.split_once(CATEGORY_SEPARATOR) {
        Some((parent, child)) => !parent.trim().is_empty() && !child.trim().is_empty(),
        None => false,
    }
}

/// Collapse runs of whitespace left behind by nested inline markup.
#[must_use]
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
