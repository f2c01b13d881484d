use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability recorded when a card carries no status element.
pub const DEFAULT_AVAILABILITY: &str = "In Stock";

/// Brand recorded when the detail page byline cannot be resolved.
pub const UNKNOWN_BRAND: &str = "Unknown";

/// Separator between the parent and child segments of a category path.
pub const CATEGORY_SEPARATOR: &str = " > ";

/// A persisted subcategory endpoint.
///
/// The same value flows out of the navigator, out of the store, and into the
/// listing extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// `"Parent > Child"`.
    pub name: String,
    /// Absolute listing URL.
    pub url: String,
}

/// A normalized product as extracted from one listing card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub category_id: i64,
    pub category_name: String,
    pub title: String,
    pub brand: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percent: u8,
    pub rating: f64,
    pub reviews_count: u64,
    pub product_link: Option<String>,
    pub image_url: Option<String>,
    pub availability: String,
    pub scraped_at: DateTime<Utc>,
}

/// A product row as held by a catalog store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub brand: String,
    pub price: f64,
    pub original_price: f64,
    pub discount_percent: u8,
    pub rating: f64,
    pub reviews_count: u64,
    pub product_link: String,
    pub image_url: Option<String>,
    pub availability: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category row as held by a catalog store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCategory {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&StoredCategory> for Category {
    fn from(row: &StoredCategory) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            url: row.url.clone(),
        }
    }
}

/// Aggregate outcome of one orchestrator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Categories the run extracted from (discovered or loaded).
    pub categories: usize,
    /// Categories whose listing page could not be processed.
    pub categories_failed: usize,
    /// Products written to the store.
    pub products_saved: usize,
    /// Extracted products the store rejected.
    pub products_skipped: usize,
}
