//! Browser automation capability.
//!
//! Scrapers talk to the page only through [`PageDriver`]. Element handles are
//! opaque keys minted by the driver; a handle is only meaningful on the page
//! that produced it and goes stale after navigation or reload.

pub mod chrome;
#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

pub use chrome::ChromeDriver;

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub(crate) fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub(crate) fn key(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page lifecycle point a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    Load,
    DomContentLoaded,
}

/// One page of a browser session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for `wait`, failing with
    /// [`DriverError::NavigationTimeout`] after `timeout`.
    async fn navigate(&self, url: &str, wait: WaitUntil, timeout: Duration)
        -> Result<(), DriverError>;

    /// Reload the current page.
    async fn reload(&self, timeout: Duration) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// First element matching `selector` inside `scope` (or the document).
    async fn query_selector(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError>;

    /// All elements matching `selector` inside `scope`, in document order.
    async fn query_selector_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// Wait until `selector` matches, failing with
    /// [`DriverError::ElementNotFound`] after `timeout`.
    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError>;

    async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError>;

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Click `element`. A forced click skips the visibility check.
    async fn click(&self, element: &ElementHandle, force: bool) -> Result<(), DriverError>;

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Run a JavaScript function declaration (`(el) => ...`) with `element`
    /// as its argument and return its JSON result.
    async fn evaluate_on(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<serde_json::Value, DriverError>;

    /// Close the page. Dropping the driver also releases it.
    async fn close(&self) -> Result<(), DriverError>;
}

/// Trimmed text of the first `selector` match inside `scope`, or `None` when
/// the element is absent or blank.
pub async fn text_of(
    driver: &dyn PageDriver,
    scope: &ElementHandle,
    selector: &str,
) -> Result<Option<String>, DriverError> {
    let Some(element) = driver.query_selector(Some(scope), selector).await? else {
        return Ok(None);
    };
    let text = driver.text_content(&element).await?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Attribute of the first `selector` match inside `scope`.
pub async fn attribute_of(
    driver: &dyn PageDriver,
    scope: &ElementHandle,
    selector: &str,
    name: &str,
) -> Result<Option<String>, DriverError> {
    let Some(element) = driver.query_selector(Some(scope), selector).await? else {
        return Ok(None);
    };
    Ok(driver
        .attribute(&element, name)
        .await?
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty()))
}
