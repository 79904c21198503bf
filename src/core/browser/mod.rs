// src/core/browser/mod.rs

// The headless-browser engine is a collaborator, not part of this crate's
// logic: checkers only ever talk to the `PageDriver` capability below.
// `chrome.rs` supplies the default engine adapter; tests inject fakes.
pub mod chrome;
pub mod launch;

#[cfg(test)]
pub mod fake;

use crate::core::error::ScanError;
use crate::core::models::ResourceSample;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use self::launch::LaunchConfig;

/// Default budget for any single in-page operation (evaluate, screenshot).
pub const OP_TIMEOUT: Duration = Duration::from_secs(25);
/// Budget for one navigation attempt.
pub const NAV_TIMEOUT: Duration = Duration::from_secs(20);
/// Budget for the body-exists fallback between navigation attempts.
pub const BODY_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to let a navigation attempt settle before giving up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Wait for the network to go quiet. Ideal for analysis, but pages with
    /// persistent polling or websockets may never reach it.
    NetworkIdle,
    /// Wait only for initial HTML parse completion.
    DomContentLoaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub mobile: bool,
}

impl Viewport {
    /// Desktop viewport every scan starts in.
    pub const DESKTOP: Viewport = Viewport {
        width: 1440,
        height: 900,
        mobile: false,
    };
    /// Mobile viewport the responsive checker switches to mid-scan.
    pub const MOBILE: Viewport = Viewport {
        width: 390,
        height: 844,
        mobile: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screenshot {
    FullPage,
    ViewportOnly,
}

impl Screenshot {
    pub fn mime(&self) -> &'static str {
        "image/webp"
    }
}

/// The capability surface this crate needs from a headless browser page:
/// navigate, evaluate a script, capture a screenshot, change the viewport,
/// and report the responses observed since navigation began.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str, wait: WaitUntil) -> Result<(), ScanError>;
    async fn evaluate(&self, script: &str) -> Result<Value, ScanError>;
    async fn screenshot(&self, shot: Screenshot) -> Result<Vec<u8>, ScanError>;
    async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScanError>;
    async fn resources(&self) -> Vec<ResourceSample>;
    /// Tears the underlying browser down. Must be safe to call exactly once
    /// on every exit path; failures are swallowed by implementations.
    async fn close(&mut self);
}

/// Launches browsers. One engine serves many concurrent scans; every scan
/// gets its own session.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_session(&self, config: &LaunchConfig) -> Result<PageSession, ScanError>;
}

/// Owns exactly one browser + page for the lifetime of a single scan.
///
/// The session layers the timeout discipline on top of the raw driver: a
/// 25 s budget per in-page operation and the three-tier navigation fallback.
/// It is never shared across scans and must be `close`d on every exit path.
pub struct PageSession {
    driver: Box<dyn PageDriver>,
}

impl PageSession {
    pub fn new(driver: Box<dyn PageDriver>) -> Self {
        Self { driver }
    }

    /// Navigates with graceful fallback:
    /// 1. wait for network quiescence (20 s);
    /// 2. on timeout only, check whether a body already exists (5 s); the
    ///    page may be fully usable even though the network never went quiet;
    /// 3. failing that, re-navigate waiting only for HTML parse (20 s).
    ///
    /// Non-timeout navigation errors (DNS, connection refused, TLS) are
    /// fatal and propagate immediately.
    pub async fn navigate(&self, url: &str) -> Result<(), ScanError> {
        match timeout(NAV_TIMEOUT, self.driver.goto(url, WaitUntil::NetworkIdle)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) if !e.is_timeout() => return Err(e),
            Ok(Err(_)) | Err(_) => {
                warn!(url, "Network-idle navigation timed out, trying current page state.");
            }
        }

        // The first attempt may have left a partially loaded page behind.
        if self.wait_for_body().await.is_ok() {
            debug!(url, "Body present after timeout, continuing with partial load.");
            return Ok(());
        }

        info!(url, "No body yet, re-navigating with lenient wait strategy.");
        match timeout(NAV_TIMEOUT, self.driver.goto(url, WaitUntil::DomContentLoaded)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout("navigation".into())),
        }
    }

    async fn wait_for_body(&self) -> Result<(), ScanError> {
        let deadline = Instant::now() + BODY_WAIT_TIMEOUT;
        loop {
            let probe = timeout(
                Duration::from_secs(1),
                self.driver.evaluate("document.body !== null"),
            )
            .await;
            if let Ok(Ok(Value::Bool(true))) = probe {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScanError::Timeout("body wait".into()));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Evaluates a script in the page under the per-operation budget.
    pub async fn evaluate(&self, script: &str) -> Result<Value, ScanError> {
        match timeout(OP_TIMEOUT, self.driver.evaluate(script)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout("script evaluation".into())),
        }
    }

    /// Evaluates a script and deserializes its JSON payload.
    pub async fn evaluate_as<T: DeserializeOwned>(&self, script: &str) -> Result<T, ScanError> {
        let value = self.evaluate(script).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Captures a screenshot and encodes it as an inline data URI.
    pub async fn screenshot_data_uri(&self, shot: Screenshot) -> Result<String, ScanError> {
        let bytes = match timeout(OP_TIMEOUT, self.driver.screenshot(shot)).await {
            Ok(result) => result?,
            Err(_) => return Err(ScanError::Timeout("screenshot".into())),
        };
        Ok(format!("data:{};base64,{}", shot.mime(), BASE64.encode(bytes)))
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScanError> {
        match timeout(OP_TIMEOUT, self.driver.set_viewport(viewport)).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout("viewport change".into())),
        }
    }

    pub async fn resources(&self) -> Vec<ResourceSample> {
        self.driver.resources().await
    }

    /// Closes the underlying browser. Close errors are swallowed by the
    /// driver; this can never fail the scan.
    pub async fn close(mut self) {
        self.driver.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakePage;
    use super::*;

    #[tokio::test]
    async fn navigation_success_takes_first_tier() {
        let page = FakePage::new();
        let session = PageSession::new(Box::new(page));
        session.navigate("https://example.com/").await.unwrap();
    }

    #[tokio::test]
    async fn timeout_falls_back_to_existing_body() {
        let page = FakePage::new()
            .fail_network_idle_with(ScanError::Timeout("navigation".into()))
            .on("document.body !== null", serde_json::json!(true));
        let session = PageSession::new(Box::new(page));
        session.navigate("https://example.com/").await.unwrap();
    }

    #[tokio::test]
    async fn timeout_without_body_renavigates_leniently() {
        let page = FakePage::new()
            .fail_network_idle_with(ScanError::Timeout("navigation".into()))
            .on("document.body !== null", serde_json::json!(false));
        let session = PageSession::new(Box::new(page));
        // The lenient goto succeeds in the fake.
        session.navigate("https://example.com/").await.unwrap();
    }

    #[tokio::test]
    async fn fatal_navigation_errors_skip_the_fallback_ladder() {
        let page = FakePage::new()
            .fail_network_idle_with(ScanError::Navigation("dns failure".into()));
        let session = PageSession::new(Box::new(page));
        let err = session.navigate("https://nxdomain.invalid/").await.unwrap_err();
        assert!(matches!(err, ScanError::Navigation(_)));
    }

    #[tokio::test]
    async fn screenshots_are_data_uris() {
        let session = PageSession::new(Box::new(FakePage::new()));
        let uri = session
            .screenshot_data_uri(Screenshot::ViewportOnly)
            .await
            .unwrap();
        assert!(uri.starts_with("data:image/webp;base64,"));
    }
}
