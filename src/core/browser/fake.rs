// src/core/browser/fake.rs

//! Scripted in-memory `PageDriver` used throughout the unit tests.
//!
//! Evaluation responses are registered against a marker substring of the
//! script; the first registered marker contained in the evaluated script
//! wins. Unmatched scripts evaluate to `null`.

use super::{PageDriver, Screenshot, Viewport, WaitUntil};
use crate::core::error::ScanError;
use crate::core::models::ResourceSample;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakePage {
    responses: Mutex<Vec<(String, Value)>>,
    network_idle_error: Mutex<Option<ScanError>>,
    resources: Vec<ResourceSample>,
    pub navigations: Arc<Mutex<Vec<(String, WaitUntil)>>>,
    pub evaluated: Arc<Mutex<Vec<String>>>,
    pub viewports: Arc<Mutex<Vec<Viewport>>>,
    pub screenshots_taken: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the value returned by any script containing `marker`.
    pub fn on(self, marker: &str, value: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push((marker.to_string(), value));
        self
    }

    /// Makes the first (network-idle) navigation attempt fail.
    pub fn fail_network_idle_with(self, error: ScanError) -> Self {
        *self.network_idle_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_resources(mut self, resources: Vec<ResourceSample>) -> Self {
        self.resources = resources;
        self
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str, wait: WaitUntil) -> Result<(), ScanError> {
        self.navigations.lock().unwrap().push((url.to_string(), wait));
        if wait == WaitUntil::NetworkIdle {
            if let Some(error) = self.network_idle_error.lock().unwrap().take() {
                return Err(error);
            }
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, ScanError> {
        self.evaluated.lock().unwrap().push(script.to_string());
        let responses = self.responses.lock().unwrap();
        for (marker, value) in responses.iter() {
            if script.contains(marker.as_str()) {
                return Ok(value.clone());
            }
        }
        Ok(Value::Null)
    }

    async fn screenshot(&self, _shot: Screenshot) -> Result<Vec<u8>, ScanError> {
        self.screenshots_taken.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0x52, 0x49, 0x46, 0x46])
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), ScanError> {
        self.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    async fn resources(&self) -> Vec<ResourceSample> {
        self.resources.clone()
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
