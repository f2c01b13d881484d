use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{ElementHandle, PageDriver, WaitUntil};
use crate::error::{DriverError, SessionError};
use crate::session::SessionConfig;

/// Attribute used to tag elements the driver has handed out.
const HANDLE_ATTR: &str = "data-scout-handle";

/// Headless Chrome page driven over CDP.
///
/// Elements are tagged with a per-document unique attribute when they are
/// first returned, so a handle is just a selector for that tag.
pub struct ChromeDriver {
    // Field order matters: the tab must drop before the browser process.
    tab: Arc<Tab>,
    _browser: Browser,
    closed: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct QueryReply {
    #[serde(default)]
    detached: bool,
    #[serde(default)]
    handles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ElementReply {
    #[serde(default)]
    detached: bool,
    #[serde(default)]
    value: Value,
}

/// Run a blocking CDP call without stalling the other tasks on this worker.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(f)
}

/// Run `close` through [`blocking`] unless `closed` was already set.
fn close_once<E>(closed: &AtomicBool, close: impl FnOnce() -> Result<(), E>) -> Result<(), E> {
    if closed.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    blocking(close)
}

impl ChromeDriver {
    /// Launch Chrome with the stealth configuration and open one page.
    pub fn launch(config: &SessionConfig) -> Result<Self, SessionError> {
        info!(headless = config.headless, "Launching Chrome...");

        let args: Vec<&OsStr> = config.launch_args.iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.viewport))
            .args(args)
            .build()
            .map_err(|e| SessionError::Launch {
                reason: e.to_string(),
            })?;

        let browser = Browser::new(options).map_err(|e| SessionError::Launch {
            reason: e.to_string(),
        })?;

        let tab = browser.new_tab().map_err(|e| SessionError::Page {
            reason: e.to_string(),
        })?;

        tab.set_user_agent(&config.user_agent, Some("en-US,en;q=0.9"), None)
            .map_err(|e| SessionError::Stealth {
                reason: e.to_string(),
            })?;

        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: config.init_script.clone(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(|e| SessionError::Stealth {
            reason: e.to_string(),
        })?;

        debug!(user_agent = %config.user_agent, "Stealth script installed");

        Ok(Self {
            tab,
            _browser: browser,
            closed: AtomicBool::new(false),
        })
    }

    fn eval_json<T: DeserializeOwned>(&self, script: &str) -> Result<T, DriverError> {
        let result = blocking(|| self.tab.evaluate(script, false)).map_err(|e| {
            DriverError::Script {
                reason: e.to_string(),
            }
        })?;
        let raw = result
            .value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Script {
                reason: "script returned no value".to_string(),
            })?;
        serde_json::from_str(raw).map_err(|e| DriverError::Script {
            reason: e.to_string(),
        })
    }

    fn lookup_expr(handle: &ElementHandle) -> String {
        let selector = format!("[{HANDLE_ATTR}=\"{}\"]", handle.key());
        format!("document.querySelector({})", json!(selector))
    }

    fn query(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let scope_expr = scope.map_or_else(|| "document".to_string(), Self::lookup_expr);
        let limit = limit.map_or_else(|| "undefined".to_string(), |n| n.to_string());
        let script = format!(
            r#"(() => {{
                const scope = {scope_expr};
                if (!scope) return JSON.stringify({{ detached: true }});
                window.__scoutDoc = window.__scoutDoc || Math.random().toString(36).slice(2);
                window.__scoutSeq = window.__scoutSeq || 0;
                const found = Array.from(scope.querySelectorAll({selector})).slice(0, {limit});
                const handles = found.map((el) => {{
                    if (!el.getAttribute({attr})) {{
                        el.setAttribute({attr}, window.__scoutDoc + '-' + (++window.__scoutSeq));
                    }}
                    return el.getAttribute({attr});
                }});
                return JSON.stringify({{ handles }});
            }})()"#,
            selector = json!(selector),
            attr = json!(HANDLE_ATTR),
        );

        let reply: QueryReply = self.eval_json(&script)?;
        if reply.detached {
            return Err(DriverError::Detached {
                handle: scope.map(ToString::to_string).unwrap_or_default(),
            });
        }
        Ok(reply.handles.into_iter().map(ElementHandle::new).collect())
    }

    fn on_element(&self, element: &ElementHandle, function: &str) -> Result<Value, DriverError> {
        let script = format!(
            r"(() => {{
                const el = {lookup};
                if (!el) return JSON.stringify({{ detached: true }});
                const value = ({function})(el);
                return JSON.stringify({{ value: value === undefined ? null : value }});
            }})()",
            lookup = Self::lookup_expr(element),
        );
        let reply: ElementReply = self.eval_json(&script)?;
        if reply.detached {
            return Err(DriverError::Detached {
                handle: element.to_string(),
            });
        }
        Ok(reply.value)
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(
        &self,
        url: &str,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        debug!(url, ?wait, "Navigating");
        let timed_out = |e: anyhow::Error| {
            debug!(url, error = %e, "Navigation wait failed");
            DriverError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }
        };

        blocking(|| {
            self.tab.set_default_timeout(timeout);
            self.tab
                .navigate_to(url)
                .map_err(|e| DriverError::Protocol(e.to_string()))?;
            match wait {
                WaitUntil::Load => self.tab.wait_until_navigated().map(|_| ()).map_err(timed_out),
                // A parsed body is as far as DOMContentLoaded goes.
                WaitUntil::DomContentLoaded => self
                    .tab
                    .wait_for_element_with_custom_timeout("body", timeout)
                    .map(|_| ())
                    .map_err(timed_out),
            }
        })
    }

    async fn reload(&self, timeout: Duration) -> Result<(), DriverError> {
        blocking(|| {
            self.tab.set_default_timeout(timeout);
            self.tab
                .reload(false, None)
                .map_err(|e| DriverError::Protocol(e.to_string()))?;
            self.tab
                .wait_until_navigated()
                .map(|_| ())
                .map_err(|_| DriverError::NavigationTimeout {
                    url: self.tab.get_url(),
                    timeout,
                })
        })
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.tab.get_url())
    }

    async fn query_selector(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.query(scope, selector, Some(1))?.into_iter().next())
    }

    async fn query_selector_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        self.query(scope, selector, None)
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        let not_found = || DriverError::ElementNotFound {
            selector: selector.to_string(),
            timeout,
        };
        blocking(|| self.tab.wait_for_element_with_custom_timeout(selector, timeout))
            .map_err(|_| not_found())?;
        self.query(None, selector, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(not_found)
    }

    async fn text_content(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let value = self.on_element(element, "(el) => el.textContent || ''")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let function = format!("(el) => el.getAttribute({})", json!(name));
        let value = self.on_element(element, &function)?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self, element: &ElementHandle, force: bool) -> Result<(), DriverError> {
        let function = if force {
            "(el) => { el.click(); return true; }"
        } else {
            r"(el) => {
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 && rect.height === 0) return false;
                el.click();
                return true;
            }"
        };
        match self.on_element(element, function)? {
            Value::Bool(true) => Ok(()),
            _ => Err(DriverError::NotClickable {
                reason: format!("element {element} has no visible box"),
            }),
        }
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), DriverError> {
        self.on_element(element, "(el) => { el.scrollIntoView({ block: 'center' }); return true; }")
            .map(|_| ())
    }

    async fn evaluate_on(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<Value, DriverError> {
        self.on_element(element, function)
    }

    async fn close(&self) -> Result<(), DriverError> {
        close_once(&self.closed, || self.tab.close(true).map(|_| ()))
            .map_err(|e| DriverError::Protocol(e.to_string()))
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Err(e) = close_once(&self.closed, || self.tab.close(true).map(|_| ())) {
            warn!(error = %e, "Failed to close tab during cleanup");
        }
        debug!("Chrome session released");
    }
}
