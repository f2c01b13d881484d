use super::*;

// -----------------------------------------------------------------------
// prices and discount
// -----------------------------------------------------------------------

#[test]
fn parse_price_strips_currency_and_separators() {
    assert!((parse_price("$1,299.99") - 1299.99).abs() < f64::EPSILON);
    assert!((parse_price(" 24.50 ") - 24.5).abs() < f64::EPSILON);
}

#[test]
fn parse_price_defaults_to_zero() {
    assert_eq!(parse_price(""), 0.0);
    assert_eq!(parse_price("Currently unavailable"), 0.0);
    assert_eq!(parse_price("1.2.3"), 0.0);
}

#[test]
fn original_price_defaults_to_parsed_current_price() {
    let (price, original) = parse_price_pair(Some("$19.99"), None);
    assert!((price - 19.99).abs() < f64::EPSILON);
    assert!((original - 19.99).abs() < f64::EPSILON);
    assert_eq!(discount_percent(price, original), 0);
}

#[test]
fn missing_current_price_is_zero() {
    assert_eq!(parse_price_pair(None, None), (0.0, 0.0));
}

#[test]
fn discount_is_floored_percentage() {
    assert_eq!(discount_percent(75.0, 100.0), 25);
    assert_eq!(discount_percent(19.99, 29.99), 33);
    assert_eq!(discount_percent(0.0, 50.0), 100);
}

#[test]
fn discount_is_zero_when_original_not_higher() {
    assert_eq!(discount_percent(100.0, 100.0), 0);
    assert_eq!(discount_percent(120.0, 100.0), 0);
    assert_eq!(discount_percent(10.0, 0.0), 0);
    assert_eq!(discount_percent(10.0, f64::NAN), 0);
}

#[test]
fn discount_stays_in_range_over_a_price_grid() {
    let samples = [0.0, 0.01, 1.0, 9.99, 49.5, 100.0, 999.99, 1e7];
    for &price in &samples {
        for &original in &samples {
            let percent = discount_percent(price, original);
            assert!(percent <= 100, "{price} / {original} -> {percent}");
            if original <= price {
                assert_eq!(percent, 0, "{price} / {original}");
            }
        }
    }
}

// -----------------------------------------------------------------------
// rating and reviews
// -----------------------------------------------------------------------

#[test]
fn rating_takes_first_decimal_number() {
    assert!((parse_rating("4.5 out of 5 stars") - 4.5).abs() < f64::EPSILON);
    assert!((parse_rating("Rated 3.8 of 5.0") - 3.8).abs() < f64::EPSILON);
}

#[test]
fn rating_without_decimal_is_unknown() {
    assert_eq!(parse_rating("5 out of 5 stars"), 0.0);
    assert_eq!(parse_rating(""), 0.0);
}

#[test]
fn rating_is_clamped() {
    assert_eq!(parse_rating("9.7 points"), 5.0);
}

#[test]
fn review_count_strips_non_digits() {
    assert_eq!(parse_review_count("(12,345)"), 12_345);
    assert_eq!(parse_review_count("no reviews"), 0);
}

// -----------------------------------------------------------------------
// brand
// -----------------------------------------------------------------------

#[test]
fn brand_strips_store_byline() {
    assert_eq!(clean_brand("Visit the Anker Store"), "Anker");
    assert_eq!(clean_brand("  Brand: Logitech "), "Logitech");
    assert_eq!(clean_brand("Sony"), "Sony");
}

#[test]
fn brand_falls_back_to_unknown() {
    assert_eq!(clean_brand(""), "Unknown");
    assert_eq!(clean_brand("x"), "Unknown");
    assert_eq!(clean_brand("Visit the  Store"), "Unknown");
}

// -----------------------------------------------------------------------
// urls and category names
// -----------------------------------------------------------------------

#[test]
fn absolute_url_resolves_relative_links() {
    let base = Url::parse("https://www.amazon.com").unwrap();
    assert_eq!(
        absolute_url(&base, "/s?bbn=16225009011&rh=n%3A281407").as_deref(),
        Some("https://www.amazon.com/s?bbn=16225009011&rh=n%3A281407")
    );
    assert_eq!(
        absolute_url(&base, "https://other.example/x").as_deref(),
        Some("https://other.example/x")
    );
}

#[test]
fn absolute_url_rejects_blank_and_script_links() {
    let base = Url::parse("https://www.amazon.com").unwrap();
    assert_eq!(absolute_url(&base, "  "), None);
    assert_eq!(absolute_url(&base, "javascript:void(0)"), None);
}

#[test]
fn category_path_joins_two_levels() {
    assert_eq!(
        category_path(" Electronics ", "TV & Video").as_deref(),
        Some("Electronics > TV & Video")
    );
    assert!(is_category_path("Electronics > TV & Video"));
}

#[test]
fn category_path_rejects_blank_segments() {
    assert_eq!(category_path("", "TV"), None);
    assert_eq!(category_path("Electronics", "   "), None);
    assert!(!is_category_path("Electronics"));
    assert!(!is_category_path(" > TV"));
}

#[test]
fn squash_whitespace_collapses_runs() {
    assert_eq!(squash_whitespace("  Echo \n  Dot\t(5th Gen) "), "Echo Dot (5th Gen)");
}
