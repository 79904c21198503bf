// src/core/error.rs

use thiserror::Error;

/// Unified error type for the scan pipeline.
///
/// The variants follow the handler's error taxonomy: request-class errors
/// carry specific user-facing messages, rate limiting carries the seconds
/// until the window resets, and everything else is internal detail that is
/// logged server-side and collapsed into a generic failure at the boundary.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Malformed body, missing/oversized URL, or an unsafe target.
    /// Always raised before any network or browser action.
    #[error("{0}")]
    InvalidRequest(String),

    /// Too many requests from one client identifier.
    #[error("Rate limit exceeded. Try again in {retry_after}s.")]
    RateLimited { retry_after: u64 },

    /// Fatal navigation failure (DNS, connection refused, TLS). These do
    /// not trigger the fallback ladder and abort the whole scan.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// A page operation exceeded its budget. Timeouts during navigation
    /// select the next fallback tier instead of failing the scan.
    #[error("timed out during {0}")]
    Timeout(String),

    /// Any other engine-side failure (evaluation, screenshot, launch).
    #[error("browser error: {0}")]
    Browser(String),

    /// An in-page script returned a payload we could not deserialize.
    #[error("unexpected page payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ScanError {
    /// Timeout-class errors feed the navigation fallback strategy; every
    /// other class escalates.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::Timeout(_))
    }
}
