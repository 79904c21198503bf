// src/core/scanner/mod.rs

// This file acts as the public interface for the `scanner` module.
// It declares the individual checkers and drives a full page audit.
pub mod accessibility;
pub mod headings;
pub mod images;
pub mod links;
pub mod performance;
pub mod responsive;
pub mod security;
pub mod seo;
pub mod sitemap;
pub mod tech_stack;
pub mod visual;

use crate::core::browser::{PageSession, Screenshot};
use crate::core::config::{Feature, FeatureConfig};
use crate::core::error::ScanError;
use crate::core::models::ScanReport;
use crate::core::score;
use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

/// Char-safe prefix truncation for page-sourced strings.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Unwraps a checker result, logging and dropping the section on failure so
/// one broken checker never takes down the rest of the scan.
fn section<T>(feature: Feature, result: Result<T, ScanError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(feature = %feature, error = %e, "Checker failed, omitting its section.");
            None
        }
    }
}

/// Navigates to the target and runs every enabled checker in sequence,
/// aggregating the weighted sub-scores into one report.
///
/// Checkers run sequentially because they share one browser page and some
/// mutate it (viewport switches, highlight overlays). The responsive checker
/// runs after everything that assumes a desktop layout.
///
/// # Arguments
/// * `session` - A fresh page session from the browser engine.
/// * `http` - Shared HTTP client for out-of-band probes.
/// * `config` - Per-feature toggles.
/// * `target` - The validated scan target.
///
/// # Returns
/// A `ScanReport` with one section per enabled checker that succeeded.
pub async fn run_full_scan(
    session: &PageSession,
    http: &reqwest::Client,
    config: &FeatureConfig,
    target: &Url,
) -> Result<ScanReport, ScanError> {
    info!(url = %target, "Starting full scan.");
    let started = Instant::now();
    session.navigate(target.as_str()).await?;
    let load_time_ms = started.elapsed().as_millis() as u64;
    info!(load_time_ms, "Navigation complete.");

    let screenshot = match session.screenshot_data_uri(Screenshot::FullPage).await {
        Ok(shot) => Some(shot),
        Err(e) => {
            warn!(error = %e, "Full-page screenshot failed, continuing without it.");
            None
        }
    };

    let mut sub_scores: Vec<(Feature, u8)> = Vec::new();
    let mut record = |feature: Feature, score: Option<u8>| {
        if let Some(score) = score {
            sub_scores.push((feature, score));
        }
    };

    let seo = if config.is_enabled(Feature::Seo) {
        section(Feature::Seo, seo::run_seo_check(session).await)
    } else {
        None
    };
    record(Feature::Seo, seo.as_ref().map(|r| r.score));

    let headings = if config.is_enabled(Feature::Headings) {
        section(Feature::Headings, headings::run_heading_check(session).await)
    } else {
        None
    };
    record(Feature::Headings, headings.as_ref().map(|r| r.score));

    let images = if config.is_enabled(Feature::Images) {
        section(Feature::Images, images::run_image_check(session).await)
    } else {
        None
    };
    record(Feature::Images, images.as_ref().map(|r| r.score));

    let links = if config.is_enabled(Feature::Links) {
        section(Feature::Links, links::run_link_check(session, target).await)
    } else {
        None
    };
    record(Feature::Links, links.as_ref().map(|r| r.score));

    let visual = if config.is_enabled(Feature::Visual) {
        section(Feature::Visual, visual::run_visual_check(session).await)
    } else {
        None
    };
    record(Feature::Visual, visual.as_ref().map(|r| r.score));

    let performance = if config.is_enabled(Feature::Performance) {
        let resources = session.resources().await;
        section(
            Feature::Performance,
            performance::run_performance_check(session, &resources, load_time_ms).await,
        )
    } else {
        None
    };
    record(Feature::Performance, performance.as_ref().map(|r| r.score));

    let accessibility = if config.is_enabled(Feature::Accessibility) {
        section(
            Feature::Accessibility,
            accessibility::run_accessibility_check(session).await,
        )
    } else {
        None
    };
    record(Feature::Accessibility, accessibility.as_ref().map(|r| r.score));

    let responsive = if config.is_enabled(Feature::Responsive) {
        section(
            Feature::Responsive,
            responsive::run_responsive_check(session).await,
        )
    } else {
        None
    };
    record(Feature::Responsive, responsive.as_ref().map(|r| r.score));

    let security = if config.is_enabled(Feature::Security) {
        section(
            Feature::Security,
            security::run_security_check(session, http, target).await,
        )
    } else {
        None
    };
    record(Feature::Security, security.as_ref().map(|r| r.score));

    let tech_stack = if config.is_enabled(Feature::TechStack) {
        section(
            Feature::TechStack,
            tech_stack::run_tech_stack_detection(session, http, target).await,
        )
    } else {
        None
    };

    let sitemap = if config.is_enabled(Feature::Sitemap) {
        Some(sitemap::run_sitemap_detection(http, target).await)
    } else {
        None
    };

    let overall_score = score::aggregate(&sub_scores);
    info!(
        overall_score,
        rating = score::label(overall_score),
        sections = sub_scores.len(),
        "Scan complete."
    );

    Ok(ScanReport {
        url: target.to_string(),
        scan_date: Utc::now(),
        overall_score,
        screenshot,
        seo,
        headings,
        images,
        links,
        visual,
        performance,
        accessibility,
        responsive,
        security,
        tech_stack,
        sitemap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::fake::FakePage;
    use serde_json::json;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo");
        assert_eq!(truncate("short", 200), "short");
        assert_eq!(truncate("", 10), "");
    }

    fn offline_config() -> FeatureConfig {
        // Keep the test off the network: these three probe the target with
        // a real HTTP client.
        FeatureConfig {
            security: false,
            tech_stack: false,
            sitemap: false,
            ..FeatureConfig::default()
        }
    }

    #[tokio::test]
    async fn failing_checkers_are_omitted_not_fatal() {
        // Every in-page script returns null, so every checker that needs
        // typed signals fails to decode and is dropped from the report.
        let page = FakePage::new();
        let session = PageSession::new(Box::new(page));
        let http = reqwest::Client::new();
        let target = Url::parse("https://site.test/").unwrap();
        let report = run_full_scan(&session, &http, &offline_config(), &target)
            .await
            .unwrap();
        assert!(report.seo.is_none());
        assert!(report.performance.is_none());
        assert_eq!(report.overall_score, 0);
        assert!(report.screenshot.is_some());
    }

    #[tokio::test]
    async fn surviving_sections_carry_the_overall_score() {
        let page = FakePage::new().on(
            "h1, h2, h3, h4, h5, h6",
            json!([{"tag": "h1", "text": "Welcome", "level": 1}]),
        );
        let navigations = page.navigations.clone();
        let session = PageSession::new(Box::new(page));
        let http = reqwest::Client::new();
        let target = Url::parse("https://site.test/").unwrap();
        let report = run_full_scan(&session, &http, &offline_config(), &target)
            .await
            .unwrap();
        {
            let navigations = navigations.lock().unwrap();
            assert_eq!(navigations.len(), 1);
            assert_eq!(navigations[0].0, "https://site.test/");
        }
        let headings = report.headings.unwrap();
        assert_eq!(headings.score, 100);
        // Headings is the only scored section, so it is the whole aggregate.
        assert_eq!(report.overall_score, 100);
        assert!(report.seo.is_none());
    }

    #[tokio::test]
    async fn disabled_features_never_run() {
        let page = FakePage::new();
        let evaluated = page.evaluated.clone();
        let session = PageSession::new(Box::new(page));
        let http = reqwest::Client::new();
        let config = FeatureConfig {
            seo: false,
            headings: false,
            images: false,
            links: false,
            visual: false,
            performance: false,
            accessibility: false,
            responsive: false,
            security: false,
            tech_stack: false,
            sitemap: false,
        };
        let target = Url::parse("https://site.test/").unwrap();
        let report = run_full_scan(&session, &http, &config, &target).await.unwrap();
        assert!(evaluated.lock().unwrap().is_empty());
        assert_eq!(report.overall_score, 0);
        assert!(report.headings.is_none());
        assert!(report.sitemap.is_none());
    }
}
