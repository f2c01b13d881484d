use std::path::PathBuf;

use url::Url;

use crate::error::ConfigError;
use crate::session::{SessionConfig, DEFAULT_USER_AGENT};

/// Runtime settings for a harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub base_url: Url,
    pub headless: bool,
    pub user_agent: String,
    pub viewport: (u32, u32),
    /// Sleep between browser actions.
    pub pacing: bool,
    pub store_path: PathBuf,
    pub log_level: String,
    pub log_file: PathBuf,
    pub max_categories: usize,
    pub max_subcategories: usize,
    pub max_products: usize,
}

impl HarvestConfig {
    /// Browser launch settings derived from this configuration.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            headless: self.headless,
            viewport: self.viewport,
            user_agent: self.user_agent.clone(),
            ..SessionConfig::default()
        }
    }
}

/// Load configuration from the environment, reading `.env` first if present.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is set to an unparseable value.
pub fn load_config() -> Result<HarvestConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key))
}

/// Build configuration using the provided env-var lookup function.
pub(crate) fn build_config<F>(lookup: F) -> Result<HarvestConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        parse_flag(&raw).ok_or_else(|| invalid(var, format!("expected a boolean, got {raw:?}")))
    };

    let raw_url = or_default("HARVEST_BASE_URL", "https://www.amazon.com");
    let base_url = Url::parse(&raw_url).map_err(|e| invalid("HARVEST_BASE_URL", e.to_string()))?;
    if base_url.cannot_be_a_base() {
        return Err(invalid("HARVEST_BASE_URL", "not a base URL".to_string()));
    }

    let raw_viewport = or_default("HARVEST_VIEWPORT", "1920x1080");
    let viewport = parse_viewport(&raw_viewport).ok_or_else(|| {
        invalid(
            "HARVEST_VIEWPORT",
            format!("expected WIDTHxHEIGHT, got {raw_viewport:?}"),
        )
    })?;

    Ok(HarvestConfig {
        base_url,
        headless: parse_bool("HARVEST_HEADLESS", "true")?,
        user_agent: or_default("HARVEST_USER_AGENT", DEFAULT_USER_AGENT),
        viewport,
        pacing: parse_bool("HARVEST_PACING", "true")?,
        store_path: PathBuf::from(or_default("HARVEST_STORE_PATH", "data/catalog.json")),
        log_level: or_default("HARVEST_LOG_LEVEL", "info"),
        log_file: PathBuf::from(or_default("HARVEST_LOG_FILE", "logs/deal-scout.log")),
        max_categories: parse_usize("HARVEST_MAX_CATEGORIES", "5")?,
        max_subcategories: parse_usize("HARVEST_MAX_SUBCATEGORIES", "10")?,
        max_products: parse_usize("HARVEST_MAX_PRODUCTS", "10")?,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `"1920x1080"` to `(1920, 1080)`; both sides must be positive.
fn parse_viewport(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse::<u32>().ok().filter(|w| *w > 0)?;
    let h = h.trim().parse::<u32>().ok().filter(|h| *h > 0)?;
    Some((w, h))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
