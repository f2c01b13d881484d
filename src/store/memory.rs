use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{Catalog, CatalogStore};
use crate::error::PersistenceError;
use crate::models::{Category, Product, StoredProduct};

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Mutex<Catalog>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // Upserts never leave the catalog half-written.
        self.catalog
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn products(&self) -> Vec<StoredProduct> {
        self.lock().products().to_vec()
    }

    pub fn snapshot(&self) -> Catalog {
        self.lock().clone()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_category(&self, name: &str, url: &str) -> Result<i64, PersistenceError> {
        let id = self.lock().upsert_category(name, url)?;
        debug!(id, name, "Category stored");
        Ok(id)
    }

    async fn insert_product(&self, product: &Product) -> Result<i64, PersistenceError> {
        let id = self.lock().upsert_product(product)?;
        debug!(id, title = %product.title, "Product stored");
        Ok(id)
    }

    async fn all_categories(&self) -> Result<Vec<Category>, PersistenceError> {
        Ok(self.lock().sorted_categories())
    }
}
