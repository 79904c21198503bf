// src/core/scanner/headings.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{clamp_score, Heading, HeadingResults};
use tracing::{debug, info};

const EXTRACT_SCRIPT: &str = r#"(() => {
  const headings = [];
  document.querySelectorAll('h1, h2, h3, h4, h5, h6').forEach((h) => {
    headings.push({
      tag: h.tagName.toLowerCase(),
      text: (h.textContent || '').trim().substring(0, 100),
      level: parseInt(h.tagName[1], 10),
    });
  });
  return headings;
})()"#;

fn analyze(structure: Vec<Heading>) -> HeadingResults {
    let mut issues = Vec::new();

    let h1_count = structure.iter().filter(|h| h.tag == "h1").count();
    if h1_count == 0 {
        issues.push("No H1 tag found".to_string());
    }
    if h1_count > 1 {
        issues.push(format!("Multiple H1 tags found ({h1_count})"));
    }
    if structure.is_empty() {
        issues.push("No heading tags found".to_string());
    }

    // Only the first hierarchy skip is reported.
    for pair in structure.windows(2) {
        if pair[1].level > pair[0].level + 1 {
            issues.push(format!("Heading hierarchy skip: {} -> {}", pair[0].tag, pair[1].tag));
            break;
        }
    }

    let score = clamp_score(100 - issues.len() as i32 * 20);
    HeadingResults {
        score,
        structure,
        h1_count,
        issues,
    }
}

/// Audits the page's heading structure for H1 discipline and hierarchy
/// skips.
pub async fn run_heading_check(session: &PageSession) -> Result<HeadingResults, ScanError> {
    debug!("Starting heading structure analysis.");
    let structure: Vec<Heading> = session.evaluate_as(EXTRACT_SCRIPT).await?;
    let results = analyze(structure);
    info!(score = results.score, h1_count = results.h1_count, "Heading check finished.");
    Ok(results)
}
