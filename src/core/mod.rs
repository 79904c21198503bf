// src/core/mod.rs

// The `core` module holds everything below the request surface: the
// browser abstraction, the checkers, scoring, and request validation.

/// Browser engine abstraction and the chromiumoxide-backed implementation.
pub mod browser;

/// Per-feature scan toggles loaded from an optional JSON file.
pub mod config;

/// The scan error type shared by every layer.
pub mod error;

/// Request validation: rate limiting, URL normalization and the SSRF guard.
pub mod guard;

/// In-page element highlighting and evidence screenshot capture.
pub mod highlight;

/// Data structures for checker results and the final scan report.
pub mod models;

/// The individual page checkers and the full-scan orchestrator.
pub mod scanner;

/// Weighted aggregation of checker sub-scores.
pub mod score;
