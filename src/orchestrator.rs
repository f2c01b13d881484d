//! Run-level coordination: discovery, extraction and persistence.

use std::sync::Arc;

use tracing::{error, info, warn};
use url::Url;

use crate::error::HarvestError;
use crate::models::{Category, RunSummary};
use crate::scrapers::{CategoryNavigator, DiscoveryLimits, ListingExtractor};
use crate::session::{Session, SessionManager};
use crate::store::CatalogStore;

/// Drives whole harvest runs against one store.
///
/// Each entry point owns a single browser session for its whole run and
/// visits categories strictly one after another.
pub struct Harvester {
    sessions: SessionManager,
    store: Arc<dyn CatalogStore>,
    navigator: CategoryNavigator,
    extractor: ListingExtractor,
}

impl Harvester {
    pub fn new(sessions: SessionManager, store: Arc<dyn CatalogStore>, base_url: Url) -> Self {
        Self {
            navigator: CategoryNavigator::new(base_url.clone(), Arc::clone(&store)),
            extractor: ListingExtractor::new(base_url),
            sessions,
            store,
        }
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: CategoryNavigator) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn with_extractor(mut self, extractor: ListingExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Discover categories from the menu, then extract and store products
    /// for each of them.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::Session`] if no browser could be started.
    /// Everything after that is logged and counted in the summary.
    pub async fn run_full_scraping(
        &self,
        limits: DiscoveryLimits,
        max_products: usize,
    ) -> Result<RunSummary, HarvestError> {
        info!(
            max_categories = limits.max_categories,
            max_subcategories = limits.max_subcategories,
            max_products,
            "Starting full scraping"
        );
        let session = self.sessions.acquire()?;

        info!("Step 1: discovering categories");
        let categories = self.navigator.discover(&session, limits).await;
        if categories.is_empty() {
            warn!("No categories discovered");
        }

        info!(count = categories.len(), "Step 2: scraping products");
        let summary = self.scrape_categories(&session, &categories, max_products).await;
        session.release().await;

        log_summary(&summary);
        Ok(summary)
    }

    /// Extract products for every category already in the store.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError`] if the stored categories cannot be listed or
    /// no browser could be started.
    pub async fn scrape_existing_categories(
        &self,
        max_products: usize,
    ) -> Result<RunSummary, HarvestError> {
        let categories = self.store.all_categories().await?;
        if categories.is_empty() {
            warn!("No categories in store, run a full scrape first");
            return Ok(RunSummary::default());
        }

        info!(count = categories.len(), "Scraping stored categories");
        let session = self.sessions.acquire()?;
        let summary = self.scrape_categories(&session, &categories, max_products).await;
        session.release().await;

        log_summary(&summary);
        Ok(summary)
    }

    async fn scrape_categories(
        &self,
        session: &Session,
        categories: &[Category],
        max_products: usize,
    ) -> RunSummary {
        let mut summary = RunSummary {
            categories: categories.len(),
            ..RunSummary::default()
        };

        for (i, category) in categories.iter().enumerate() {
            info!(
                n = i + 1,
                of = categories.len(),
                category = %category.name,
                "Processing category"
            );
            let products = match self.extractor.extract(session, category, max_products).await {
                Ok(products) => products,
                Err(e) => {
                    error!(category = %category.name, error = %e, "Failed to scrape category");
                    summary.categories_failed += 1;
                    continue;
                }
            };

            for product in &products {
                match self.store.insert_product(product).await {
                    Ok(id) => {
                        summary.products_saved += 1;
                        info!(id, title = %product.title, "Saved product");
                    }
                    Err(e) => {
                        summary.products_skipped += 1;
                        warn!(title = %product.title, error = %e, "Failed to save product");
                    }
                }
            }
        }
        summary
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        categories = summary.categories,
        categories_failed = summary.categories_failed,
        products_saved = summary.products_saved,
        products_skipped = summary.products_skipped,
        "Scraping completed"
    );
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
