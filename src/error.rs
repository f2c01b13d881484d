use std::time::Duration;

use thiserror::Error;

/// Failures reported by a [`crate::browser::PageDriver`].
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("no element matched `{selector}` within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("element handle {handle} is no longer attached to the page")]
    Detached { handle: String },

    #[error("element is not clickable: {reason}")]
    NotClickable { reason: String },

    #[error("page script failed: {reason}")]
    Script { reason: String },

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// `true` for the "not there (yet)" class of failures that callers treat
    /// as an absent feature rather than a broken page.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DriverError::ElementNotFound { .. } | DriverError::Detached { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to launch browser: {reason}")]
    Launch { reason: String },

    #[error("failed to open a page in the browser: {reason}")]
    Page { reason: String },

    #[error("failed to apply stealth settings: {reason}")]
    Stealth { reason: String },
}

/// Why a single product card did not yield a record.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("card {index} has no title")]
    MissingTitle { index: usize },

    #[error("card {index} could not be read: {source}")]
    Driver {
        index: usize,
        #[source]
        source: DriverError,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("product \"{title}\" has no product link to key it by")]
    MissingProductLink { title: String },

    #[error("invalid category \"{name}\": {reason}")]
    InvalidCategory { name: String, reason: String },

    #[error("unknown category id {0}")]
    UnknownCategory(i64),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that escape an orchestrator entry point or a whole phase.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Malformed configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
