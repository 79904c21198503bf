// src/core/browser/chrome.rs

//! Chromium adapter for the `BrowserEngine`/`PageDriver` capabilities.
//!
//! This is the only module that speaks CDP; everything above it works in
//! terms of the traits in the parent module, so checkers and tests never
//! depend on a real browser.

use super::launch::{ExecutableSource, LaunchConfig};
use super::{BrowserEngine, PageDriver, PageSession, Screenshot, Viewport, WaitUntil};
use crate::core::error::ScanError;
use crate::core::models::{ResourceKind, ResourceSample};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

fn map_cdp(err: CdpError) -> ScanError {
    match err {
        CdpError::Timeout => ScanError::Timeout("page operation".into()),
        other => ScanError::Browser(other.to_string()),
    }
}

/// Launches one Chromium per session. Stateless, so a single instance can
/// serve any number of concurrent scans.
pub struct ChromeEngine;

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn new_session(&self, config: &LaunchConfig) -> Result<PageSession, ScanError> {
        let mut builder = BrowserConfig::builder();
        match &config.executable {
            ExecutableSource::Path(path) => {
                builder = builder.chrome_executable(path);
            }
            ExecutableSource::RemotePack { pack_url } => {
                // The pack is unpacked at deploy time; the binary location
                // arrives through CHROME_EXECUTABLE, otherwise discovery
                // falls back to whatever is on PATH.
                debug!(pack_url, "Serverless launch, relying on pre-unpacked Chromium.");
                if let Some(path) = std::env::var_os("CHROME_EXECUTABLE") {
                    builder = builder.chrome_executable(path);
                }
            }
        }
        for arg in &config.args {
            builder = builder.arg(arg);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .window_size(Viewport::DESKTOP.width, Viewport::DESKTOP.height)
            .build()
            .map_err(ScanError::Browser)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(map_cdp)?;

        // The handler future must be polled for the whole browser lifetime.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(map_cdp)?;

        // Record every response the page receives so the performance checker
        // can break the payload down by resource type later.
        let resources = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&resources);
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(map_cdp)?;
        let listener_task = tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let response = &event.response;
                let sample = ResourceSample {
                    url: response.url.clone(),
                    kind: ResourceKind::from_content_type(&response.mime_type.to_ascii_lowercase()),
                    size_bytes: response.encoded_data_length.max(0.0) as u64,
                };
                if let Ok(mut samples) = sink.lock() {
                    samples.push(sample);
                }
            }
        });

        Ok(PageSession::new(Box::new(ChromePage {
            browser: Some(browser),
            page,
            handler_task,
            listener_task,
            resources,
        })))
    }
}

struct ChromePage {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
    resources: Arc<Mutex<Vec<ResourceSample>>>,
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn goto(&self, url: &str, wait: WaitUntil) -> Result<(), ScanError> {
        self.page.goto(url).await.map_err(map_cdp)?;
        if wait == WaitUntil::NetworkIdle {
            self.page.wait_for_navigation().await.map_err(map_cdp)?;
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScanError> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(ScanError::Browser)?;
        let result = self.page.evaluate(params).await.map_err(map_cdp)?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn screenshot(&self, shot: Screenshot) -> Result<Vec<u8>, ScanError> {
        let params = match shot {
            Screenshot::FullPage => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Webp)
                .quality(60)
                .full_page(true)
                .build(),
            Screenshot::ViewportOnly => ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Webp)
                .quality(70)
                .full_page(false)
                .build(),
        };
        self.page.screenshot(params).await.map_err(map_cdp)
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScanError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(viewport.width))
            .height(i64::from(viewport.height))
            .device_scale_factor(1.0)
            .mobile(viewport.mobile)
            .build()
            .map_err(ScanError::Browser)?;
        self.page.execute(params).await.map_err(map_cdp)?;
        Ok(())
    }

    async fn resources(&self) -> Vec<ResourceSample> {
        match self.resources.lock() {
            Ok(samples) => samples.clone(),
            Err(_) => Vec::new(),
        }
    }

    async fn close(&mut self) {
        self.listener_task.abort();
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "Browser close failed, process may linger.");
            }
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
    }
}
