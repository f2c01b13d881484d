use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Catalog, CatalogStore};
use crate::error::PersistenceError;
use crate::models::{Category, Product};

/// Catalog persisted as one pretty-printed JSON document.
///
/// Every successful write rewrites the file through a temporary sibling and a
/// rename, so a crash mid-run keeps everything stored before it. A write that
/// fails leaves the in-memory catalog as it was.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    catalog: Mutex<Catalog>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the file exists but cannot be read or
    /// parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let catalog = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Catalog::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            path = %path.display(),
            categories = catalog.categories().len(),
            products = catalog.products().len(),
            "Opened catalog"
        );
        Ok(Self {
            path,
            catalog: Mutex::new(catalog),
        })
    }

    pub async fn snapshot(&self) -> Catalog {
        self.catalog.lock().await.clone()
    }

    async fn save(&self, catalog: &Catalog) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(catalog)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Catalog saved");
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for JsonFileStore {
    async fn insert_category(&self, name: &str, url: &str) -> Result<i64, PersistenceError> {
        let mut catalog = self.catalog.lock().await;
        let mut next = catalog.clone();
        let id = next.upsert_category(name, url)?;
        if next.categories().len() != catalog.categories().len() {
            self.save(&next).await?;
            *catalog = next;
        }
        Ok(id)
    }

    async fn insert_product(&self, product: &Product) -> Result<i64, PersistenceError> {
        let mut catalog = self.catalog.lock().await;
        let mut next = catalog.clone();
        let id = next.upsert_product(product)?;
        self.save(&next).await?;
        *catalog = next;
        Ok(id)
    }

    async fn all_categories(&self) -> Result<Vec<Category>, PersistenceError> {
        Ok(self.catalog.lock().await.sorted_categories())
    }
}
