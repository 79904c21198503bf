// src/api.rs

use crate::core::browser::{BrowserEngine, LaunchConfig};
use crate::core::config::FeatureConfig;
use crate::core::error::ScanError;
use crate::core::guard::{client_id, normalize_target, validate_body, RateLimiter};
use crate::core::scanner::run_full_scan;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Hard wall-clock budget for one scan, browser time included.
const SCAN_BUDGET: Duration = Duration::from_secs(60);

/// The message clients get for any internal failure. Details stay in the
/// server log; error strings from the browser layer can leak local paths.
const GENERIC_FAILURE: &str = "Scan failed. Please check the URL and try again.";

/// A transport-agnostic response: status code, JSON body and the optional
/// Retry-After value for rate-limited requests.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body, retry_after: None }
    }

    fn bad_request(message: &str) -> Self {
        Self { status: 400, body: json!({ "error": message }), retry_after: None }
    }

    fn rate_limited(retry_after: u64) -> Self {
        Self {
            status: 429,
            body: json!({ "error": format!("Rate limit exceeded. Try again in {retry_after}s.") }),
            retry_after: Some(retry_after),
        }
    }

    fn internal_error() -> Self {
        Self { status: 500, body: json!({ "error": GENERIC_FAILURE }), retry_after: None }
    }
}

/// The scan endpoint. Owns the browser engine, the per-client rate limiter
/// and the shared HTTP client; one instance serves all requests.
pub struct ScanHandler {
    engine: Arc<dyn BrowserEngine>,
    limiter: RateLimiter,
    http: reqwest::Client,
    config: FeatureConfig,
    launch: LaunchConfig,
}

impl ScanHandler {
    pub fn new(
        engine: Arc<dyn BrowserEngine>,
        limiter: RateLimiter,
        http: reqwest::Client,
        config: FeatureConfig,
        launch: LaunchConfig,
    ) -> Self {
        Self { engine, limiter, http, config, launch }
    }

    /// Handles one scan request end to end: rate limit, body validation,
    /// target safety, browser session, the scan itself.
    ///
    /// # Arguments
    /// * `body` - The raw JSON request body.
    /// * `forwarded_for` - The X-Forwarded-For header, if present.
    /// * `real_ip` - The X-Real-IP header, if present.
    pub async fn handle(
        &self,
        body: &str,
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
    ) -> ApiResponse {
        let client = client_id(forwarded_for, real_ip);
        let decision = self.limiter.check(&client);
        if !decision.allowed {
            warn!(client, retry_after = decision.retry_after, "Rate limit hit.");
            return ApiResponse::rate_limited(decision.retry_after);
        }

        let raw_url = match validate_body(body) {
            Ok(url) => url,
            Err(e) => {
                info!(client, error = %e, "Rejected request body.");
                return ApiResponse::bad_request(&e.to_string());
            }
        };
        let target = match normalize_target(&raw_url) {
            Ok(target) => target,
            Err(e) => {
                info!(client, url = raw_url, error = %e, "Rejected scan target.");
                return ApiResponse::bad_request(&e.to_string());
            }
        };

        let session = match self.engine.new_session(&self.launch).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Browser session could not be started.");
                return ApiResponse::internal_error();
            }
        };

        let outcome = tokio::time::timeout(
            SCAN_BUDGET,
            run_full_scan(&session, &self.http, &self.config, &target),
        )
        .await;
        // The browser is closed before the response goes out, on every path.
        session.close().await;

        let report = match outcome {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!(url = %target, error = %e, "Scan failed.");
                return ApiResponse::internal_error();
            }
            Err(_) => {
                error!(url = %target, budget_s = SCAN_BUDGET.as_secs(), "Scan exceeded its time budget.");
                return ApiResponse::internal_error();
            }
        };

        match serde_json::to_value(&report) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => {
                error!(error = %e, "Report serialization failed.");
                ApiResponse::internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::fake::FakePage;
    use crate::core::browser::{PageSession, WaitUntil};
    use crate::core::guard::SystemClock;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Hands out FakePage sessions and keeps the per-session spy handles so
    /// tests can assert on what the handler did with them.
    #[derive(Default)]
    struct FakeEngine {
        handles: Mutex<Vec<SessionHandles>>,
        fail_launch: bool,
    }

    struct SessionHandles {
        navigations: Arc<Mutex<Vec<(String, WaitUntil)>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl BrowserEngine for FakeEngine {
        async fn new_session(&self, _config: &LaunchConfig) -> Result<PageSession, ScanError> {
            if self.fail_launch {
                return Err(ScanError::Browser("no executable".into()));
            }
            let page = FakePage::new().on(
                "h1, h2, h3, h4, h5, h6",
                json!([{"tag": "h1", "text": "Welcome", "level": 1}]),
            );
            self.handles.lock().unwrap().push(SessionHandles {
                navigations: page.navigations.clone(),
                closed: page.closed.clone(),
            });
            Ok(PageSession::new(Box::new(page)))
        }
    }

    fn offline_config() -> FeatureConfig {
        FeatureConfig {
            security: false,
            tech_stack: false,
            sitemap: false,
            ..FeatureConfig::default()
        }
    }

    fn handler(engine: Arc<FakeEngine>) -> ScanHandler {
        ScanHandler::new(
            engine,
            RateLimiter::new(Arc::new(SystemClock)),
            reqwest::Client::new(),
            offline_config(),
            LaunchConfig::from_environment(),
        )
    }

    #[tokio::test]
    async fn successful_scan_returns_the_report() {
        let engine = Arc::new(FakeEngine::default());
        let h = handler(engine.clone());
        let response = h
            .handle(r#"{"url": "https://site.test/"}"#, None, None)
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["url"], "https://site.test/");
        assert!(response.body["headings"]["score"].is_number());

        let handles = engine.handles.lock().unwrap();
        assert_eq!(handles.len(), 1);
        assert!(handles[0].closed.load(Ordering::SeqCst));
        let navigations = handles[0].navigations.lock().unwrap();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].0, "https://site.test/");
    }

    #[tokio::test]
    async fn invalid_body_is_a_400_before_any_browser_work() {
        let engine = Arc::new(FakeEngine::default());
        let h = handler(engine.clone());
        let response = h.handle("not json", None, None).await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Invalid request body");
        assert!(engine.handles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn internal_targets_never_reach_the_browser() {
        let engine = Arc::new(FakeEngine::default());
        let h = handler(engine.clone());
        for target in [
            "http://127.0.0.1/admin",
            "http://localhost:8080/",
            "http://192.168.1.1/",
            "http://metadata.internal/",
        ] {
            let body = json!({ "url": target }).to_string();
            let response = h.handle(&body, None, None).await;
            assert_eq!(response.status, 400, "{target}");
            assert!(
                response.body["error"].as_str().unwrap().contains("not allowed"),
                "{target}"
            );
        }
        assert!(engine.handles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sixth_request_in_the_window_is_rate_limited() {
        let engine = Arc::new(FakeEngine::default());
        let h = handler(engine);
        let body = r#"{"url": "https://site.test/"}"#;
        for _ in 0..5 {
            let response = h.handle(body, Some("9.9.9.9"), None).await;
            assert_ne!(response.status, 429);
        }
        let response = h.handle(body, Some("9.9.9.9"), None).await;
        assert_eq!(response.status, 429);
        assert!(response.retry_after.is_some());
        assert!(response.body["error"]
            .as_str()
            .unwrap()
            .starts_with("Rate limit exceeded"));
    }

    #[tokio::test]
    async fn clients_are_limited_independently() {
        let engine = Arc::new(FakeEngine::default());
        let h = handler(engine);
        let body = r#"{"url": "https://site.test/"}"#;
        for _ in 0..5 {
            h.handle(body, Some("1.1.1.1"), None).await;
        }
        let other = h.handle(body, Some("2.2.2.2"), None).await;
        assert_eq!(other.status, 200);
    }

    #[tokio::test]
    async fn launch_failure_is_a_generic_500() {
        let engine = Arc::new(FakeEngine {
            fail_launch: true,
            ..FakeEngine::default()
        });
        let h = handler(engine);
        let response = h
            .handle(r#"{"url": "https://site.test/"}"#, None, None)
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(response.body["error"], GENERIC_FAILURE);
    }
}
