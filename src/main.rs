use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use deal_scout::config::{load_config, HarvestConfig};
use deal_scout::models::RunSummary;
use deal_scout::orchestrator::Harvester;
use deal_scout::scrapers::DiscoveryLimits;
use deal_scout::session::{Pacer, SessionManager};
use deal_scout::store::JsonFileStore;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "deal-scout")]
#[command(about = "Harvest product listings and deals with a headless browser")]
struct Cli {
    /// Show the browser window instead of running headless.
    #[arg(long, global = true)]
    headful: bool,

    /// Catalog file to read and write.
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Discover categories from the site menu, then scrape each of them.
    Full {
        #[arg(long)]
        max_categories: Option<usize>,
        #[arg(long)]
        max_subcategories: Option<usize>,
        #[arg(long)]
        max_products: Option<usize>,
    },
    /// Re-scrape products for categories already in the catalog.
    Rescan {
        #[arg(long)]
        max_products: Option<usize>,
    },
}

/// Console plus plain-text file logging. Keep the guard alive until exit or
/// buffered file lines are lost.
fn init_tracing(config: &HarvestConfig) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("Invalid log level {:?}", config.log_level))?;

    let (log_dir, file_name) = log_target(&config.log_file)?;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (file_writer, guard) = non_blocking(rolling::never(log_dir, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Ok(guard)
}

/// Split a log file path into the directory and file name the appender takes.
fn log_target(path: &Path) -> anyhow::Result<(&Path, &OsStr)> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file {} has no file name", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((dir, file_name))
}

fn saved_note(summary: &RunSummary, store: &Path) -> Option<String> {
    (summary.products_saved > 0).then(|| format!("💾 Catalog saved to {}", store.display()))
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Categories processed: {}", summary.categories);
    println!("Categories failed:    {}", summary.categories_failed);
    println!("Products saved:       {}", summary.products_saved);
    println!("Products skipped:     {}", summary.products_skipped);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config().context("Failed to load configuration")?;
    if cli.headful {
        config.headless = false;
    }
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    let _log_guard = init_tracing(&config)?;

    info!("Deal Scout");
    info!(
        base_url = %config.base_url,
        store = %config.store_path.display(),
        headless = config.headless,
        "Configuration loaded"
    );

    let store = JsonFileStore::open(config.store_path.clone())
        .await
        .with_context(|| format!("Failed to open catalog {}", config.store_path.display()))?;
    let sessions = SessionManager::chrome(config.session_config(), Pacer::new(config.pacing));
    let harvester = Harvester::new(sessions, Arc::new(store), config.base_url.clone());

    let summary = match cli.command {
        Commands::Full {
            max_categories,
            max_subcategories,
            max_products,
        } => {
            let limits = DiscoveryLimits {
                max_categories: max_categories.unwrap_or(config.max_categories),
                max_subcategories: max_subcategories.unwrap_or(config.max_subcategories),
            };
            harvester
                .run_full_scraping(limits, max_products.unwrap_or(config.max_products))
                .await
                .context("Full scraping failed")?
        }
        Commands::Rescan { max_products } => harvester
            .scrape_existing_categories(max_products.unwrap_or(config.max_products))
            .await
            .context("Re-scan failed")?,
    };

    print_summary(&summary);
    if let Some(note) = saved_note(&summary, &config.store_path) {
        info!("{note}");
    }
    Ok(())
}
