//! Product catalog harvester driven by a real browser.
//!
//! [`orchestrator::Harvester`] discovers categories through the site's menu
//! ([`scrapers::CategoryNavigator`]), extracts products from each category's
//! listing ([`scrapers::ListingExtractor`]) and writes them to a
//! [`store::CatalogStore`].

pub mod browser;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod scrapers;
pub mod session;
pub mod store;

pub use config::{load_config, HarvestConfig};
pub use error::{
    ConfigError, DriverError, ExtractionError, HarvestError, PersistenceError, SessionError,
};
pub use models::{Category, Product, RunSummary};
pub use orchestrator::Harvester;
