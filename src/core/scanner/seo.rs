// src/core/scanner/seo.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{clamp_score, SeoResults, TagCheck, TagStatus};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

const TITLE_MIN: usize = 30;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 120;
const DESCRIPTION_MAX: usize = 160;

/// Everything the SEO check reads from the DOM, gathered in one pass.
const EXTRACT_SCRIPT: &str = r#"(() => {
  const meta = (name) => {
    const el = document.querySelector(`meta[name="${name}"], meta[property="${name}"]`);
    return el ? el.getAttribute('content') : null;
  };
  const ogTags = {};
  document.querySelectorAll('meta[property^="og:"]').forEach((el) => {
    const prop = el.getAttribute('property');
    const content = el.getAttribute('content');
    if (prop && content) ogTags[prop] = content;
  });
  return {
    title: document.title || null,
    metaDescription: meta('description'),
    canonical: document.querySelector("link[rel='canonical']")?.getAttribute('href') || null,
    robots: meta('robots'),
    language: document.documentElement.lang || null,
    favicon: document.querySelector("link[rel='icon'], link[rel='shortcut icon']")?.getAttribute('href') || null,
    viewport: meta('viewport'),
    ogTags,
  };
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeoSignals {
    title: Option<String>,
    meta_description: Option<String>,
    canonical: Option<String>,
    robots: Option<String>,
    language: Option<String>,
    favicon: Option<String>,
    viewport: Option<String>,
    #[serde(default)]
    og_tags: BTreeMap<String, String>,
}

fn length_check(
    value: Option<String>,
    min: usize,
    max: usize,
    issues: &mut Vec<String>,
    missing_msg: &str,
    short_msg: &str,
    long_msg: &str,
) -> TagCheck {
    let length = value.as_deref().map_or(0, |v| v.chars().count());
    let status = match &value {
        None => {
            issues.push(missing_msg.to_string());
            TagStatus::Missing
        }
        Some(_) if length < min => {
            issues.push(short_msg.to_string());
            TagStatus::TooShort
        }
        Some(_) if length > max => {
            issues.push(long_msg.to_string());
            TagStatus::TooLong
        }
        Some(_) => TagStatus::Good,
    };
    TagCheck { value, length, status }
}

fn analyze(signals: SeoSignals) -> SeoResults {
    let mut issues = Vec::new();

    let title = length_check(
        signals.title,
        TITLE_MIN,
        TITLE_MAX,
        &mut issues,
        "Missing page title",
        "Title too short (< 30 chars)",
        "Title too long (> 60 chars)",
    );
    let meta_description = length_check(
        signals.meta_description,
        DESCRIPTION_MIN,
        DESCRIPTION_MAX,
        &mut issues,
        "Missing meta description",
        "Meta description too short (< 120 chars)",
        "Meta description too long (> 160 chars)",
    );

    if signals.canonical.is_none() {
        issues.push("Missing canonical URL".to_string());
    }
    if signals.viewport.is_none() {
        issues.push("Missing viewport meta tag".to_string());
    }
    if signals.language.is_none() {
        issues.push("Missing language attribute".to_string());
    }
    if signals.og_tags.is_empty() {
        issues.push("No Open Graph tags found".to_string());
    }

    let score = clamp_score(100 - issues.len() as i32 * 12);
    SeoResults {
        score,
        title,
        meta_description,
        canonical: signals.canonical,
        og_tags: signals.og_tags,
        robots: signals.robots,
        language: signals.language,
        favicon: signals.favicon,
        viewport: signals.viewport,
        issues,
    }
}

/// Runs the SEO meta analysis against the loaded page.
///
/// # Arguments
/// * `session` - The page session left on the target by navigation.
///
/// # Returns
/// A `SeoResults` with per-tag verdicts, the issue list and the sub-score.
pub async fn run_seo_check(session: &PageSession) -> Result<SeoResults, ScanError> {
    debug!("Starting SEO meta analysis.");
    let signals: SeoSignals = session.evaluate_as(EXTRACT_SCRIPT).await?;
    let results = analyze(signals);
    info!(score = results.score, issues = results.issues.len(), "SEO check finished.");
    Ok(results)
}
