//! Test harness entry point
//!
//! Owns the connection to a running browser and hands every test its own
//! isolated page session. A session is torn down when the test ends, whether
//! it passed, failed, panicked or ran out of time.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

use crate::cdp::browser::CdpBrowserImpl;
use crate::cdp::traits::{CdpBrowser, TargetHandle};
use crate::config::HarnessConfig;
use crate::session::page::CdpPageSession;
use crate::session::traits::PageSession;
use crate::wait::WaitOptions;
use crate::{Error, Result};

/// Browser-backed factory for isolated page sessions
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
    browser: Arc<dyn CdpBrowser>,
}

impl Harness {
    /// Harness talking CDP to `config.cdp_endpoint`
    pub fn new(config: HarnessConfig) -> Self {
        let browser = Arc::new(CdpBrowserImpl::new(config.cdp_endpoint.clone()));
        Self { config, browser }
    }

    /// Harness configured from `HARNESS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(HarnessConfig::from_env()?))
    }

    pub fn with_browser(config: HarnessConfig, browser: Arc<dyn CdpBrowser>) -> Self {
        Self { config, browser }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Whether a browser answers on the configured endpoint
    pub async fn is_available(&self) -> bool {
        match self.browser.get_version().await {
            Ok(version) => {
                info!("Connected to {} (protocol {})", version.product, version.protocol_version);
                true
            }
            Err(e) => {
                warn!("No browser at {}: {}", self.config.cdp_endpoint, e);
                false
            }
        }
    }

    /// Open a fresh page in its own browser context
    pub async fn open_session(&self) -> Result<SessionGuard> {
        let target = self.browser.create_target().await?;

        let session = match self.attach(&target).await {
            Ok(session) => session,
            Err(e) => {
                if let Err(dispose) = self.browser.dispose_target(&target).await {
                    warn!("Failed to dispose target {}: {}", target.target_id, dispose);
                }
                return Err(e);
            }
        };
        info!("Opened session {} on target {}", session.id(), target.target_id);

        Ok(SessionGuard {
            session,
            target,
            browser: Arc::clone(&self.browser),
        })
    }

    async fn attach(&self, target: &TargetHandle) -> Result<Arc<dyn PageSession>> {
        let client = self.browser.create_client(target).await?;
        let session = CdpPageSession::attach(
            client,
            WaitOptions::from(&self.config),
            self.config.navigation_timeout(),
        )
        .await?;
        Ok(Arc::new(session))
    }

    /// Run one test body against a fresh session.
    ///
    /// The body is bounded by `test_timeout_ms`; expiry yields `TestTimeout`.
    /// The session is always torn down afterwards, and a panic in the body is
    /// resumed once teardown has finished.
    pub async fn run<F, Fut, T>(&self, name: &str, test: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn PageSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.open_session().await?;
        let session = Arc::clone(guard.session());
        let budget = self.config.test_timeout();

        let body = AssertUnwindSafe(tokio::time::timeout(budget, test(session))).catch_unwind();
        let outcome = body.instrument(info_span!("test", name)).await;

        let teardown = guard.teardown().await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::TestTimeout(self.config.test_timeout_ms)),
            Err(panic) => {
                if let Err(e) = teardown {
                    warn!("Teardown after panic in {} failed: {}", name, e);
                }
                std::panic::resume_unwind(panic);
            }
        };

        match (result, teardown) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), teardown) => {
                if e.is_session_fault() {
                    warn!("Test {} used a handle past its session: {}", name, e);
                }
                if let Err(td) = teardown {
                    warn!("Teardown after failed test {} also failed: {}", name, td);
                }
                Err(e)
            }
        }
    }

    /// Close the browser connection
    pub async fn shutdown(&self) -> Result<()> {
        self.browser.close().await
    }
}

/// An open session plus what is needed to dispose it
#[derive(Debug)]
pub struct SessionGuard {
    session: Arc<dyn PageSession>,
    target: TargetHandle,
    browser: Arc<dyn CdpBrowser>,
}

impl SessionGuard {
    pub fn session(&self) -> &Arc<dyn PageSession> {
        &self.session
    }

    pub fn target(&self) -> &TargetHandle {
        &self.target
    }

    /// Close the session and dispose its page and browser context
    pub async fn teardown(self) -> Result<()> {
        if let Err(e) = self.session.close().await {
            warn!("Closing session {} failed: {}", self.session.id(), e);
        }
        self.browser.dispose_target(&self.target).await?;
        info!("Disposed target {}", self.target.target_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::MockCdpBrowser;
    use std::time::Duration;

    fn harness(browser: Arc<MockCdpBrowser>, test_timeout_ms: u64) -> Harness {
        let config = HarnessConfig {
            test_timeout_ms,
            ..HarnessConfig::default()
        };
        Harness::with_browser(config, browser)
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let browser = Arc::new(MockCdpBrowser::new());
        let harness = harness(browser.clone(), 1_000);

        let a = harness.open_session().await.unwrap();
        let b = harness.open_session().await.unwrap();
        assert_ne!(a.session().id(), b.session().id());
        assert_ne!(a.target().browser_context_id, b.target().browser_context_id);

        a.teardown().await.unwrap();
        b.teardown().await.unwrap();
        assert_eq!(browser.created_targets(), 2);
        assert_eq!(browser.disposed_targets(), 2);
    }

    #[tokio::test]
    async fn test_run_tears_down_after_success() {
        let browser = Arc::new(MockCdpBrowser::new());
        let harness = harness(browser.clone(), 1_000);

        let url = harness
            .run("navigate", |session| async move {
                session.goto("https://www.saucedemo.com/").await?;
                session.current_url().await
            })
            .await
            .unwrap();

        assert_eq!(url, "https://www.saucedemo.com/");
        assert_eq!(browser.disposed_targets(), 1);
    }

    #[tokio::test]
    async fn test_run_tears_down_after_failure() {
        let browser = Arc::new(MockCdpBrowser::new());
        let harness = harness(browser.clone(), 1_000);

        let err = harness
            .run("fails", |_session| async move {
                Err::<(), _>(Error::element_not_found("id=missing", 5_000))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ElementNotFound { .. }));
        assert_eq!(browser.disposed_targets(), 1);
    }

    #[tokio::test]
    async fn test_run_enforces_test_budget() {
        let browser = Arc::new(MockCdpBrowser::new());
        let harness = harness(browser.clone(), 50);

        let err = harness
            .run("hangs", |_session| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TestTimeout(50)));
        assert_eq!(browser.disposed_targets(), 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_use() {
        let browser = Arc::new(MockCdpBrowser::new());
        let harness = harness(browser, 1_000);

        let guard = harness.open_session().await.unwrap();
        let session = Arc::clone(guard.session());
        guard.teardown().await.unwrap();

        assert!(!session.is_active());
        assert!(matches!(session.goto("about:blank").await, Err(Error::SessionClosed(_))));
    }

    #[tokio::test]
    async fn test_mock_browser_is_available() {
        let harness = harness(Arc::new(MockCdpBrowser::new()), 1_000);
        assert!(harness.is_available().await);
    }
}
