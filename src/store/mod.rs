//! Persistence contract the crawler relies on, plus two implementations.
//!
//! Stores own idempotency: categories are unique by `(name, url)` and
//! products by `product_link`. Callers never lock around them.

mod json_file;
mod memory;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PersistenceError;
use crate::models::{Category, Product, StoredCategory, StoredProduct};
use crate::scrapers::normalize::is_category_path;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a category, or return the id of the existing `(name, url)` pair.
    async fn insert_category(&self, name: &str, url: &str) -> Result<i64, PersistenceError>;

    /// Insert a product, or refresh the one with the same product link.
    async fn insert_product(&self, product: &Product) -> Result<i64, PersistenceError>;

    /// All categories ordered by name.
    async fn all_categories(&self) -> Result<Vec<Category>, PersistenceError>;
}

/// Plain catalog state shared by the store implementations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    categories: Vec<StoredCategory>,
    #[serde(default)]
    products: Vec<StoredProduct>,
}

impl Catalog {
    pub fn categories(&self) -> &[StoredCategory] {
        &self.categories
    }

    pub fn products(&self) -> &[StoredProduct] {
        &self.products
    }

    fn next_category_id(&self) -> i64 {
        self.categories.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    fn next_product_id(&self) -> i64 {
        self.products.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    pub fn upsert_category(&mut self, name: &str, url: &str) -> Result<i64, PersistenceError> {
        if !is_category_path(name) {
            return Err(PersistenceError::InvalidCategory {
                name: name.to_string(),
                reason: "expected \"<parent> > <child>\"".to_string(),
            });
        }
        if Url::parse(url).is_err() {
            return Err(PersistenceError::InvalidCategory {
                name: name.to_string(),
                reason: format!("url {url:?} is not absolute"),
            });
        }

        if let Some(existing) = self
            .categories
            .iter()
            .find(|c| c.name == name && c.url == url)
        {
            return Ok(existing.id);
        }

        let id = self.next_category_id();
        self.categories.push(StoredCategory {
            id,
            name: name.to_string(),
            url: url.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    pub fn upsert_product(&mut self, product: &Product) -> Result<i64, PersistenceError> {
        let Some(link) = product.product_link.as_deref() else {
            return Err(PersistenceError::MissingProductLink {
                title: product.title.clone(),
            });
        };
        if !self.categories.iter().any(|c| c.id == product.category_id) {
            return Err(PersistenceError::UnknownCategory(product.category_id));
        }

        let now = Utc::now();
        if let Some(row) = self.products.iter_mut().find(|p| p.product_link == link) {
            row.title.clone_from(&product.title);
            row.brand.clone_from(&product.brand);
            row.price = product.price;
            row.original_price = product.original_price;
            row.discount_percent = product.discount_percent;
            row.rating = product.rating;
            row.reviews_count = product.reviews_count;
            row.image_url.clone_from(&product.image_url);
            row.availability.clone_from(&product.availability);
            row.updated_at = now;
            return Ok(row.id);
        }

        let id = self.next_product_id();
        self.products.push(StoredProduct {
            id,
            category_id: product.category_id,
            title: product.title.clone(),
            brand: product.brand.clone(),
            price: product.price,
            original_price: product.original_price,
            discount_percent: product.discount_percent,
            rating: product.rating,
            reviews_count: product.reviews_count,
            product_link: link.to_string(),
            image_url: product.image_url.clone(),
            availability: product.availability.clone(),
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    pub fn sorted_categories(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self.categories.iter().map(Category::from).collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        categories
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
