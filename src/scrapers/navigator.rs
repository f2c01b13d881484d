//! Category discovery through the site's hamburger menu.
//!
//! The traversal is an explicit state machine. [`CategoryNavigator::step`]
//! performs exactly one transition:
//!
//! | from                   | outcome                         | to                          |
//! |------------------------|---------------------------------|-----------------------------|
//! | `MenuClosed { next }`  | menu opened (directly or via logo) | `MenuOpen { next }`      |
//! | `MenuClosed { next }`  | menu cannot be opened           | `Aborted`                   |
//! | `MenuOpen { i }`       | no more top-level links         | `Done`                      |
//! | `MenuOpen { i }`       | blank label, "See All", click failure | `MenuOpen { i + 1 }`  |
//! | `MenuOpen { i }`       | department clicked              | `CategoryOpen { i, name }`  |
//! | `CategoryOpen { .. }`  | subcategories collected and stored | `SubcategoryListed { i, name }` |
//! | `SubcategoryListed`    | back control returned to the list | `MenuOpen { i + 1 }`     |
//! | `SubcategoryListed`    | no back control, page reloaded  | `MenuClosed { i + 1 }`      |
//! | `SubcategoryListed`    | reload failed                   | `Aborted`                   |

use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use url::Url;

use super::normalize::{absolute_url, category_path, squash_whitespace};
use super::types::{MenuSelectors, MenuTimeouts};
use crate::browser::{ElementHandle, PageDriver, WaitUntil};
use crate::error::DriverError;
use crate::models::Category;
use crate::session::Session;
use crate::store::CatalogStore;

/// Label of the top-level entry that expands the department list in place.
const SEE_ALL: &str = "see all";

/// Scrolls the menu container so the clicked link sits at its top.
const MENU_SCROLL_FN: &str = r"(el) => {
    const container = el.closest('#hmenu-content') || document.querySelector('#hmenu-content');
    if (container) { container.scrollTop = el.offsetTop - container.offsetTop; }
    return true;
}";

/// Subcategory labels this short are menu decorations.
const MIN_SUBCATEGORY_LABEL: usize = 3;

/// Position in the menu traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuState {
    /// The department list is not on screen; `next` is the department to
    /// resume from once it is.
    MenuClosed { next: usize },
    /// The department list is on screen.
    MenuOpen { next: usize },
    /// Department `index` was clicked and its submenu is expected.
    CategoryOpen { index: usize, name: String },
    /// Department `index` has been harvested; the submenu is still showing.
    SubcategoryListed { index: usize, name: String },
    Done,
    Aborted,
}

impl MenuState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MenuState::Done | MenuState::Aborted)
    }
}

/// Caps for one discovery run.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryLimits {
    pub max_categories: usize,
    pub max_subcategories: usize,
}

/// Mutable bookkeeping carried through the state machine.
#[derive(Debug, Default)]
pub struct Traversal {
    /// Top-level labels, captured the first time the menu opens.
    labels: Option<Vec<String>>,
    categories: Vec<Category>,
}

impl Traversal {
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }
}

pub struct CategoryNavigator {
    base_url: Url,
    store: Arc<dyn CatalogStore>,
    selectors: MenuSelectors,
    timeouts: MenuTimeouts,
    span: Span,
}

impl CategoryNavigator {
    pub fn new(base_url: Url, store: Arc<dyn CatalogStore>) -> Self {
        Self {
            base_url,
            store,
            selectors: MenuSelectors::default(),
            timeouts: MenuTimeouts::default(),
            span: info_span!("navigator"),
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: MenuSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: MenuTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Log under `span` instead of the default `navigator` span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Walk the menu and store every discovered subcategory.
    ///
    /// Returns the stored categories in discovery order. Failures are logged.
    /// An aborted traversal yields an empty list, though categories stored
    /// before the abort stay in the store.
    pub async fn discover(&self, session: &Session, limits: DiscoveryLimits) -> Vec<Category> {
        self.run(session, limits).instrument(self.span.clone()).await
    }

    async fn run(&self, session: &Session, limits: DiscoveryLimits) -> Vec<Category> {
        let driver = session.driver();
        info!(url = %self.base_url, "Opening home page");
        if let Err(e) = driver
            .navigate(self.base_url.as_str(), WaitUntil::Load, self.timeouts.home_load)
            .await
        {
            error!(error = %e, "Home page did not load");
            return Vec::new();
        }
        session.wait(3.0, 6.0).await;

        let mut traversal = Traversal::default();
        let mut state = MenuState::MenuClosed { next: 0 };
        while !state.is_terminal() {
            debug!(?state, "Menu transition");
            state = self.step(session, state, &mut traversal, limits).await;
        }

        if state == MenuState::Aborted {
            warn!(
                stored = traversal.categories.len(),
                "Menu traversal aborted, no categories discovered"
            );
            return Vec::new();
        }
        info!(
            total = traversal.categories.len(),
            "Categories scraped and saved"
        );
        traversal.categories
    }

    /// Perform one transition of the traversal.
    pub async fn step(
        &self,
        session: &Session,
        state: MenuState,
        traversal: &mut Traversal,
        limits: DiscoveryLimits,
    ) -> MenuState {
        match state {
            MenuState::MenuClosed { next } => self.open(session, next, traversal, limits).await,
            MenuState::MenuOpen { next } => self.enter(session, next, traversal).await,
            MenuState::CategoryOpen { index, name } => {
                self.harvest(session, &name, traversal, limits).await;
                MenuState::SubcategoryListed { index, name }
            }
            MenuState::SubcategoryListed { index, name } => {
                self.back(session, index, &name).await
            }
            terminal @ (MenuState::Done | MenuState::Aborted) => terminal,
        }
    }

    async fn open(
        &self,
        session: &Session,
        next: usize,
        traversal: &mut Traversal,
        limits: DiscoveryLimits,
    ) -> MenuState {
        if let Err(e) = self.open_menu(session).await {
            error!(error = %e, "Failed to open hamburger menu");
            return MenuState::Aborted;
        }

        if traversal.labels.is_none() {
            match self.department_labels(session.driver(), limits.max_categories).await {
                Ok(labels) if !labels.is_empty() => {
                    info!(count = labels.len(), "Found main categories");
                    traversal.labels = Some(labels);
                }
                Ok(_) => {
                    warn!("Could not find main department section");
                    return MenuState::Done;
                }
                Err(e) => {
                    warn!(error = %e, "Could not read main departments");
                    return MenuState::Done;
                }
            }
        }
        MenuState::MenuOpen { next }
    }

    /// Click the hamburger; if that fails, click the logo and try once more.
    async fn open_menu(&self, session: &Session) -> Result<(), DriverError> {
        let driver = session.driver();
        if let Err(e) = self.click_hamburger(driver).await {
            warn!(error = %e, "Hamburger menu not loaded, trying the logo");
            let logo = driver
                .wait_for_selector(&self.selectors.logo, self.timeouts.logo)
                .await?;
            driver.click(&logo, true).await?;
            session.wait(2.0, 4.0).await;
            self.click_hamburger(driver).await?;
        }
        session.wait(2.0, 4.0).await;
        driver
            .wait_for_selector(&self.selectors.menu_content, self.timeouts.menu_content)
            .await?;
        Ok(())
    }

    async fn click_hamburger(&self, driver: &dyn PageDriver) -> Result<(), DriverError> {
        let menu = driver
            .wait_for_selector(&self.selectors.hamburger, self.timeouts.hamburger)
            .await?;
        driver.scroll_into_view(&menu).await?;
        driver.click(&menu, true).await
    }

    async fn department_section(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<Option<ElementHandle>, DriverError> {
        if let Some(section) = driver.query_selector(None, &self.selectors.departments).await? {
            return Ok(Some(section));
        }
        driver
            .query_selector(None, &self.selectors.departments_fallback)
            .await
    }

    async fn department_links(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        match self.department_section(driver).await? {
            Some(section) => {
                driver
                    .query_selector_all(Some(&section), &self.selectors.menu_item)
                    .await
            }
            None => Ok(Vec::new()),
        }
    }

    async fn department_labels(
        &self,
        driver: &dyn PageDriver,
        max_categories: usize,
    ) -> Result<Vec<String>, DriverError> {
        let links = self.department_links(driver).await?;
        let mut labels = Vec::new();
        for link in links.iter().take(max_categories) {
            let text = driver.text_content(link).await?;
            labels.push(squash_whitespace(&text));
        }
        Ok(labels)
    }

    async fn enter(&self, session: &Session, next: usize, traversal: &Traversal) -> MenuState {
        let labels = traversal.labels.as_deref().unwrap_or_default();
        let Some(name) = labels.get(next) else {
            return MenuState::Done;
        };
        let skip = MenuState::MenuOpen { next: next + 1 };
        if name.is_empty() {
            return skip;
        }

        let driver = session.driver();
        // Handles do not survive reloads, so look the link up again.
        let link = match self.department_links(driver).await {
            Ok(links) => links.into_iter().nth(next),
            Err(e) => {
                warn!(category = %name, error = %e, "Could not re-read main departments");
                None
            }
        };
        let Some(link) = link else {
            warn!(category = %name, "Department link disappeared");
            return skip;
        };

        info!(category = %name, "Opening main category");

        if name.eq_ignore_ascii_case(SEE_ALL) {
            if let Err(e) = driver.click(&link, true).await {
                warn!(category = %name, error = %e, "Failed to click 'See All'");
            }
            session.wait(1.0, 2.0).await;
            return skip;
        }

        if let Err(e) = driver.evaluate_on(&link, MENU_SCROLL_FN).await {
            warn!(category = %name, error = %e, "Could not scroll menu to category");
            return skip;
        }
        session.wait(0.5, 1.5).await;
        if let Err(e) = driver.click(&link, true).await {
            warn!(category = %name, error = %e, "Click failed");
            return skip;
        }

        MenuState::CategoryOpen {
            index: next,
            name: name.clone(),
        }
    }

    /// Collect, filter and store the subcategories of `parent`.
    async fn harvest(
        &self,
        session: &Session,
        parent: &str,
        traversal: &mut Traversal,
        limits: DiscoveryLimits,
    ) {
        let links = match self.subcategory_links(session, parent).await {
            Ok(links) => links,
            Err(e) => {
                warn!(category = %parent, error = %e, "Failed to extract subcategories");
                return;
            }
        };
        info!(category = %parent, count = links.len(), "Found subcategories");

        for (label, href) in links.into_iter().take(limits.max_subcategories) {
            let Some(url) = absolute_url(&self.base_url, &href) else {
                debug!(subcategory = %label, href, "Skipping unresolvable link");
                continue;
            };
            let Some(name) = category_path(parent, &label) else {
                continue;
            };
            match self.store.insert_category(&name, &url).await {
                Ok(id) => {
                    info!(id, name = %name, "Added category");
                    traversal.categories.push(Category { id, name, url });
                }
                Err(e) => error!(name = %name, error = %e, "Failed to insert category"),
            }
        }
    }

    /// `(label, href)` pairs from the submenu scoped to `parent`, with menu
    /// decorations removed.
    async fn subcategory_links(
        &self,
        session: &Session,
        parent: &str,
    ) -> Result<Vec<(String, String)>, DriverError> {
        let driver = session.driver();
        let section_selector = self.selectors.category_section(parent);
        let section = driver
            .wait_for_selector(&section_selector, self.timeouts.category_section)
            .await?;
        session.wait(1.0, 2.0).await;

        let items = driver
            .query_selector_all(Some(&section), &self.selectors.menu_item)
            .await?;
        let mut links = Vec::new();
        for item in items {
            let label = squash_whitespace(&driver.text_content(&item).await?);
            let href = driver.attribute(&item, "href").await?.unwrap_or_default();
            if href.trim().is_empty() || label.chars().count() < MIN_SUBCATEGORY_LABEL {
                continue;
            }
            links.push((label, href));
        }
        Ok(links)
    }

    async fn back(&self, session: &Session, index: usize, name: &str) -> MenuState {
        let driver = session.driver();
        match self.click_back(session, name).await {
            Ok(true) => return MenuState::MenuOpen { next: index + 1 },
            Ok(false) => debug!(category = %name, "No back control, reloading"),
            Err(e) => warn!(category = %name, error = %e, "Back navigation failed, reloading"),
        }

        if let Err(e) = driver.reload(self.timeouts.reload).await {
            error!(error = %e, "Reload failed, ending traversal");
            return MenuState::Aborted;
        }
        session.wait(3.0, 5.0).await;
        MenuState::MenuClosed { next: index + 1 }
    }

    /// `Ok(false)` when the submenu has no back control.
    async fn click_back(&self, session: &Session, name: &str) -> Result<bool, DriverError> {
        let driver = session.driver();
        let section = driver
            .query_selector(None, &self.selectors.category_section(name))
            .await?;
        let mut back = match section {
            Some(section) => {
                driver
                    .query_selector(Some(&section), &self.selectors.back_button)
                    .await?
            }
            None => None,
        };
        if back.is_none() {
            back = driver.query_selector(None, &self.selectors.back_button).await?;
        }
        let Some(back) = back else {
            return Ok(false);
        };

        driver.click(&back, true).await?;
        driver
            .wait_for_selector(&self.selectors.departments, self.timeouts.back)
            .await?;
        session.wait(2.0, 2.0).await;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "navigator_test.rs"]
mod tests;
