// src/core/scanner/images.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::highlight::{capture_highlighted, ElementPredicate};
use crate::core::models::{clamp_score, ImageDetail, ImageResults, LabeledScreenshot};
use crate::core::scanner::truncate;
use serde::Deserialize;
use tracing::{debug, info};

const EXTRACT_SCRIPT: &str = r#"(() => {
  return Array.from(document.querySelectorAll('img')).map((img) => ({
    src: img.src || img.getAttribute('data-src') || '',
    alt: img.alt || null,
    hasAlt: img.hasAttribute('alt'),
    naturalWidth: img.naturalWidth,
    width: img.width,
    height: img.height,
    loading: img.loading || null,
  }));
})()"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageSignal {
    src: String,
    alt: Option<String>,
    has_alt: bool,
    natural_width: u32,
    width: u32,
    height: u32,
    loading: Option<String>,
}

fn analyze(signals: Vec<ImageSignal>) -> ImageResults {
    let total = signals.len();
    let without_alt = signals.iter().filter(|i| !i.has_alt).count();
    let broken = signals
        .iter()
        .filter(|i| i.natural_width == 0 && !i.src.is_empty())
        .count();
    let lazy_loaded = signals
        .iter()
        .filter(|i| i.loading.as_deref() == Some("lazy"))
        .count();

    let mut issues = Vec::new();
    if without_alt > 0 {
        issues.push(format!("{without_alt} image(s) missing alt attribute"));
    }
    if broken > 0 {
        issues.push(format!("{broken} broken image(s) detected"));
    }

    let score = if total == 0 {
        100
    } else {
        let penalty = ((without_alt + broken) as f64 / total as f64 * 100.0).round() as i32;
        clamp_score(100 - penalty)
    };

    let details = signals
        .into_iter()
        .map(|i| ImageDetail {
            status: if i.natural_width == 0 { "broken" } else { "ok" }.to_string(),
            src: truncate(&i.src, 200),
            alt: i.alt,
            has_alt: i.has_alt,
            width: i.width,
            height: i.height,
            loading: i.loading.unwrap_or_else(|| "eager".to_string()),
        })
        .collect();

    ImageResults {
        score,
        total,
        with_alt: total - without_alt,
        without_alt,
        broken,
        lazy_loaded,
        details,
        issues,
        screenshots: Vec::new(),
    }
}

/// Audits every `<img>` on the page for alt text and broken sources, with
/// highlighted evidence screenshots for each problem group.
pub async fn run_image_check(session: &PageSession) -> Result<ImageResults, ScanError> {
    debug!("Starting image audit.");
    let signals: Vec<ImageSignal> = session.evaluate_as(EXTRACT_SCRIPT).await?;
    let mut results = analyze(signals);

    if results.without_alt > 0 {
        if let Some(shot) = capture_highlighted(session, ElementPredicate::MissingAlt).await? {
            results.screenshots.push(LabeledScreenshot {
                label: format!("{} image(s) missing alt text", results.without_alt),
                image: shot,
            });
        }
    }
    if results.broken > 0 {
        if let Some(shot) = capture_highlighted(session, ElementPredicate::BrokenImage).await? {
            results.screenshots.push(LabeledScreenshot {
                label: format!("{} broken image(s)", results.broken),
                image: shot,
            });
        }
    }

    info!(
        score = results.score,
        total = results.total,
        without_alt = results.without_alt,
        broken = results.broken,
        "Image check finished."
    );
    Ok(results)
}
