//! Scripted in-memory browser for tests.
//!
//! Pages are static HTML fixtures keyed by URL. Clicking an element can swap
//! the current document (menus opening, back buttons) or fail, and selected
//! URLs can be made to time out. Every handle carries the document generation
//! it came from, so handles go stale after a swap just like on a real page.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use super::{ElementHandle, PageDriver, WaitUntil};
use crate::error::{DriverError, SessionError};
use crate::session::{Launcher, SessionConfig};

#[derive(Debug, Clone)]
pub(crate) enum ClickEffect {
    /// Replace the current document.
    Show(String),
    /// Fail the click.
    Fail,
}

#[derive(Debug, Clone)]
struct ClickRule {
    selector: String,
    text: Option<String>,
    effect: ClickEffect,
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct SiteState {
    pages: HashMap<String, String>,
    timeouts: HashSet<String>,
    failing_reloads: bool,
    rules: Vec<ClickRule>,
    current_url: String,
    html: String,
    generation: u64,
    events: Vec<String>,
    launched: usize,
    released: usize,
}

/// Shared fixture state; clones observe the same site.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedSite {
    state: Arc<Mutex<SiteState>>,
}

impl ScriptedSite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().expect("scripted site lock poisoned")
    }

    pub(crate) fn page(self, url: &str, html: &str) -> Self {
        self.lock().pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Navigations to `url` time out.
    pub(crate) fn timeout(self, url: &str) -> Self {
        self.lock().timeouts.insert(url.to_string());
        self
    }

    /// Every reload times out; plain navigations are unaffected.
    pub(crate) fn failing_reloads(self) -> Self {
        self.lock().failing_reloads = true;
        self
    }

    /// Clicking an element matching `selector` (and, if given, with exactly
    /// this trimmed text) applies `effect`.
    pub(crate) fn on_click(self, selector: &str, text: Option<&str>, effect: ClickEffect) -> Self {
        self.push_rule(selector, text, effect, None)
    }

    /// Like [`Self::on_click`] but only for the first `times` matching clicks.
    pub(crate) fn on_click_times(
        self,
        selector: &str,
        text: Option<&str>,
        effect: ClickEffect,
        times: usize,
    ) -> Self {
        self.push_rule(selector, text, effect, Some(times))
    }

    fn push_rule(
        self,
        selector: &str,
        text: Option<&str>,
        effect: ClickEffect,
        remaining: Option<usize>,
    ) -> Self {
        self.lock().rules.push(ClickRule {
            selector: selector.to_string(),
            text: text.map(str::to_string),
            effect,
            remaining,
        });
        self
    }

    pub(crate) fn driver(&self) -> ScriptedDriver {
        self.lock().launched += 1;
        ScriptedDriver { site: self.clone() }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub(crate) fn launched(&self) -> usize {
        self.lock().launched
    }

    pub(crate) fn released(&self) -> usize {
        self.lock().released
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|e| DriverError::Script {
        reason: format!("bad selector `{selector}`: {e:?}"),
    })
}

fn all_elements(doc: &Html) -> Vec<ElementRef<'_>> {
    let any = Selector::parse("*").expect("universal selector");
    doc.select(&any).collect()
}

fn handle_for(generation: u64, index: usize) -> ElementHandle {
    ElementHandle::new(format!("{generation}:{index}"))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

impl SiteState {
    fn show(&mut self, html: String) {
        self.html = html;
        self.generation += 1;
    }

    fn index_of(&self, handle: &ElementHandle) -> Result<usize, DriverError> {
        let detached = || DriverError::Detached {
            handle: handle.to_string(),
        };
        let (generation, index) = handle.key().split_once(':').ok_or_else(detached)?;
        if generation.parse::<u64>().ok() != Some(self.generation) {
            return Err(detached());
        }
        index.parse().map_err(|_| detached())
    }

    fn with_element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&ElementRef<'_>) -> T,
    ) -> Result<T, DriverError> {
        let index = self.index_of(handle)?;
        let doc = Html::parse_document(&self.html);
        let all = all_elements(&doc);
        let element = all.get(index).ok_or_else(|| DriverError::Detached {
            handle: handle.to_string(),
        })?;
        Ok(f(element))
    }

    fn query(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let selector = parse_selector(selector)?;
        let doc = Html::parse_document(&self.html);
        let all = all_elements(&doc);
        let found: Vec<ElementRef<'_>> = match scope {
            Some(handle) => {
                let index = self.index_of(handle)?;
                let scope = all.get(index).ok_or_else(|| DriverError::Detached {
                    handle: handle.to_string(),
                })?;
                scope.select(&selector).collect()
            }
            None => doc.select(&selector).collect(),
        };
        Ok(found
            .iter()
            .filter_map(|el| all.iter().position(|candidate| candidate.id() == el.id()))
            .map(|index| handle_for(self.generation, index))
            .collect())
    }

    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.events.push(format!("navigate:{url}"));
        if self.timeouts.contains(url) {
            return Err(DriverError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            });
        }
        let html = self.pages.get(url).cloned().unwrap_or_default();
        self.current_url = url.to_string();
        self.show(html);
        Ok(())
    }

    fn click(&mut self, handle: &ElementHandle, force: bool) -> Result<(), DriverError> {
        let index = self.index_of(handle)?;
        let doc = Html::parse_document(&self.html);
        let all = all_elements(&doc);
        let element = all.get(index).ok_or_else(|| DriverError::Detached {
            handle: handle.to_string(),
        })?;
        let text = element_text(element).trim().to_string();

        let mut effect = None;
        for rule in &mut self.rules {
            if rule.remaining == Some(0) {
                continue;
            }
            let Ok(selector) = Selector::parse(&rule.selector) else {
                continue;
            };
            let text_matches = rule.text.as_deref().map_or(true, |t| t == text);
            if selector.matches(element) && text_matches {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                effect = Some(rule.effect.clone());
                break;
            }
        }

        self.events.push(format!(
            "click{}:{text}",
            if force { "!" } else { "" }
        ));
        match effect {
            Some(ClickEffect::Show(html)) => {
                self.show(html);
                Ok(())
            }
            Some(ClickEffect::Fail) => Err(DriverError::NotClickable {
                reason: format!("scripted failure clicking {text:?}"),
            }),
            None => Ok(()),
        }
    }
}

/// One page of a [`ScriptedSite`].
pub(crate) struct ScriptedDriver {
    site: ScriptedSite,
}

impl Drop for ScriptedDriver {
    fn drop(&mut self) {
        self.site.lock().released += 1;
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(
        &self,
        url: &str,
        _wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        self.site.lock().navigate(url, timeout)
    }

    async fn reload(&self, timeout: Duration) -> Result<(), DriverError> {
        let mut state = self.site.lock();
        state.events.push("reload".to_string());
        let url = state.current_url.clone();
        let html = state.pages.get(&url).cloned().unwrap_or_default();
        if state.failing_reloads || state.timeouts.contains(&url) {
            return Err(DriverError::NavigationTimeout { url, timeout });
        }
        state.show(html);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.site.lock().current_url.clone())
    }

    async fn query_selector(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.site.lock().query(scope, selector)?.into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.site.lock().query(scope, selector)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        self.site
            .lock()
            .query(None, selector)?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::ElementNotFound {
                selector: selector.to_string(),
                timeout,
            })
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError> {
        self.site.lock().with_element(element, element_text)
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.site
            .lock()
            .with_element(element, |el| el.value().attr(name).map(str::to_string))
    }

    async fn click(&self, element: &ElementHandle, force: bool) -> Result<(), DriverError> {
        self.site.lock().click(element, force)
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.site.lock();
        let text = state.with_element(element, element_text)?;
        state.events.push(format!("scroll:{}", text.trim()));
        Ok(())
    }

    async fn evaluate_on(
        &self,
        element: &ElementHandle,
        _function: &str,
    ) -> Result<Value, DriverError> {
        let mut state = self.site.lock();
        let text = state.with_element(element, element_text)?;
        state.events.push(format!("evaluate:{}", text.trim()));
        Ok(Value::Null)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.site.lock().events.push("close".to_string());
        Ok(())
    }
}

/// Launcher handing out drivers for one [`ScriptedSite`], or failing.
pub(crate) struct ScriptedLauncher {
    site: ScriptedSite,
    fail: bool,
}

impl ScriptedLauncher {
    pub(crate) fn new(site: ScriptedSite) -> Self {
        Self { site, fail: false }
    }

    pub(crate) fn failing(site: ScriptedSite) -> Self {
        Self { site, fail: true }
    }
}

impl Launcher for ScriptedLauncher {
    fn launch(&self, _config: &SessionConfig) -> Result<Box<dyn PageDriver>, SessionError> {
        if self.fail {
            return Err(SessionError::Launch {
                reason: "scripted launch failure".to_string(),
            });
        }
        Ok(Box::new(self.site.driver()))
    }
}
