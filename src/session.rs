//! Stealth browser sessions and request pacing.
//!
//! A [`SessionManager`] launches browsers through a [`Launcher`] and hands out
//! [`Session`]s. A session owns its page driver exclusively; whichever way the
//! owning workflow exits, dropping the session closes the page and the
//! browser process.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::{ChromeDriver, PageDriver};
use crate::error::SessionError;

/// Desktop Chrome on Windows.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

/// Masks `navigator.webdriver` and gives the page a non-empty plugin list.
pub const STEALTH_INIT_SCRIPT: &str = r"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
";

/// Launch settings for one browser session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub headless: bool,
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub init_script: String,
    pub launch_args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: (1920, 1080),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            init_script: STEALTH_INIT_SCRIPT.to_string(),
            launch_args: vec![
                "--no-sandbox".to_string(),
                "--disable-setuid-sandbox".to_string(),
                "--disable-blink-features=AutomationControlled".to_string(),
                "--disable-dev-shm-usage".to_string(),
            ],
        }
    }
}

/// Starts a browser and opens the page a session will drive.
pub trait Launcher: Send + Sync {
    fn launch(&self, config: &SessionConfig) -> Result<Box<dyn PageDriver>, SessionError>;
}

/// Launches a local headless Chrome.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromeLauncher;

impl Launcher for ChromeLauncher {
    fn launch(&self, config: &SessionConfig) -> Result<Box<dyn PageDriver>, SessionError> {
        let driver = tokio::task::block_in_place(|| ChromeDriver::launch(config))?;
        Ok(Box::new(driver))
    }
}

/// Jittered delays that imitate human think-time between actions.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    enabled: bool,
}

impl Pacer {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// A pacer that never sleeps.
    #[must_use]
    pub fn instant() -> Self {
        Self::new(false)
    }

    /// Draw a delay uniformly from `[min_secs, max_secs]`.
    #[must_use]
    pub fn draw(min_secs: f64, max_secs: f64) -> Duration {
        let (lo, hi) = if min_secs <= max_secs {
            (min_secs, max_secs)
        } else {
            (max_secs, min_secs)
        };
        let lo = lo.max(0.0);
        let hi = hi.max(0.0);
        let secs = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        Duration::from_secs_f64(secs)
    }

    pub async fn wait(&self, min_secs: f64, max_secs: f64) {
        if !self.enabled {
            return;
        }
        let delay = Self::draw(min_secs, max_secs);
        debug!(delay_ms = delay.as_millis() as u64, "Pacing");
        tokio::time::sleep(delay).await;
    }
}

/// An acquired browser session: one page plus the pacing policy.
pub struct Session {
    driver: Box<dyn PageDriver>,
    pacer: Pacer,
}

impl Session {
    pub fn new(driver: Box<dyn PageDriver>, pacer: Pacer) -> Self {
        Self { driver, pacer }
    }

    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    /// Sleep for a random duration in `[min_secs, max_secs]`.
    pub async fn wait(&self, min_secs: f64, max_secs: f64) {
        self.pacer.wait(min_secs, max_secs).await;
    }

    /// Close the page gracefully. The browser process goes away when the
    /// driver is dropped at the end of this call.
    pub async fn release(self) {
        if let Err(e) = self.driver.close().await {
            warn!(error = %e, "Error while closing browser session");
        }
        debug!("Browser session released");
    }
}

/// Hands out stealth-configured sessions.
pub struct SessionManager {
    launcher: Arc<dyn Launcher>,
    config: SessionConfig,
    pacer: Pacer,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn Launcher>, config: SessionConfig, pacer: Pacer) -> Self {
        Self {
            launcher,
            config,
            pacer,
        }
    }

    /// A manager that launches local Chrome.
    pub fn chrome(config: SessionConfig, pacer: Pacer) -> Self {
        Self::new(Arc::new(ChromeLauncher), config, pacer)
    }

    /// Launch a browser and open a stealth page.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the browser cannot start; callers treat this
    /// as fatal and do not retry.
    pub fn acquire(&self) -> Result<Session, SessionError> {
        info!(
            headless = self.config.headless,
            viewport = ?self.config.viewport,
            "Acquiring browser session"
        );
        let driver = self.launcher.launch(&self.config)?;
        Ok(Session::new(driver, self.pacer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedLauncher, ScriptedSite};

    #[test]
    fn draw_stays_within_range() {
        for _ in 0..200 {
            let delay = Pacer::draw(0.5, 1.5);
            assert!(delay >= Duration::from_millis(500), "{delay:?}");
            assert!(delay <= Duration::from_millis(1500), "{delay:?}");
        }
    }

    #[test]
    fn draw_handles_degenerate_and_reversed_ranges() {
        assert_eq!(Pacer::draw(2.0, 2.0), Duration::from_secs(2));
        let delay = Pacer::draw(3.0, 1.0);
        assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
        assert_eq!(Pacer::draw(-1.0, -0.5), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_pacer_sleeps_for_the_drawn_delay() {
        let start = tokio::time::Instant::now();
        Pacer::new(true).wait(1.0, 2.0).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
        assert!(elapsed <= Duration::from_secs(2) + Duration::from_millis(5), "{elapsed:?}");
    }

    #[test]
    fn default_config_carries_stealth_settings() {
        let config = SessionConfig::default();
        assert_eq!(config.viewport, (1920, 1080));
        assert!(config.user_agent.contains("Chrome/119"));
        assert!(config.init_script.contains("webdriver"));
        assert!(config.init_script.contains("plugins"));
        assert!(config
            .launch_args
            .iter()
            .any(|arg| arg == "--disable-blink-features=AutomationControlled"));
    }

    #[tokio::test]
    async fn release_closes_and_drops_the_driver() {
        let site = ScriptedSite::new();
        let manager = SessionManager::new(
            Arc::new(ScriptedLauncher::new(site.clone())),
            SessionConfig::default(),
            Pacer::instant(),
        );
        let session = manager.acquire().unwrap();
        assert_eq!(site.launched(), 1);
        session.release().await;
        assert_eq!(site.released(), 1);
        assert_eq!(site.events(), vec!["close".to_string()]);
    }

    #[test]
    fn dropping_a_session_releases_the_browser() {
        let site = ScriptedSite::new();
        let manager = SessionManager::new(
            Arc::new(ScriptedLauncher::new(site.clone())),
            SessionConfig::default(),
            Pacer::instant(),
        );
        {
            let _session = manager.acquire().unwrap();
        }
        assert_eq!(site.released(), 1);
    }

    #[test]
    fn launch_failure_is_a_session_error() {
        let manager = SessionManager::new(
            Arc::new(ScriptedLauncher::failing(ScriptedSite::new())),
            SessionConfig::default(),
            Pacer::instant(),
        );
        assert!(matches!(
            manager.acquire(),
            Err(SessionError::Launch { .. })
        ));
    }
}
