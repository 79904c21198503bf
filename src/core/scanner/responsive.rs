// src/core/scanner/responsive.rs

use crate::core::browser::{PageSession, Screenshot, Viewport};
use crate::core::error::ScanError;
use crate::core::models::{ElementConsistency, ResponsiveResults, TapTarget, TapTargetSummary};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Layout settle time after the viewport switch.
const MOBILE_SETTLE: Duration = Duration::from_secs(1);
/// Minimum touch-friendly hit area per WCAG guidance.
const MIN_TAP_SIZE: f64 = 44.0;

/// Counts visible navigation and content elements. Run once at desktop
/// width and once at mobile width; the delta exposes content hidden by
/// aggressive responsive breakpoints.
const VISIBLE_COUNT_SCRIPT: &str = r#"(() => {
  const getVisible = (selector) =>
    Array.from(document.querySelectorAll(selector)).filter((el) => {
      const rect = el.getBoundingClientRect();
      return rect.width > 0 && rect.height > 0 && getComputedStyle(el).display !== 'none';
    }).length;
  return {
    nav: getVisible('nav, header a, header button, .menu a'),
    content: getVisible('h1, h2, h3, p, img, article'),
  };
})()"#;

const VIEWPORT_META_SCRIPT: &str = r#"(() => {
  const el = document.querySelector('meta[name="viewport"]');
  return el ? el.getAttribute('content') : null;
})()"#;

const MOBILE_METRICS_SCRIPT: &str = r#"(() => {
  const hasHorizontalScroll = document.documentElement.scrollWidth > window.innerWidth;
  const tapTargets = Array.from(document.querySelectorAll('a, button, input, select'));
  const tapElements = [];
  tapTargets.forEach((el) => {
    const rect = el.getBoundingClientRect();
    if (rect.width > 0 && rect.height > 0 && (rect.width < 44 || rect.height < 44)) {
      if (tapElements.length < 20) {
        tapElements.push({
          html: el.outerHTML.substring(0, 150) + (el.outerHTML.length > 150 ? '...' : ''),
          width: Math.round(rect.width),
          height: Math.round(rect.height),
          x: Math.round(rect.x),
          y: Math.round(rect.y),
        });
      }
    }
  });
  let tapIssues = 0;
  tapTargets.forEach((el) => {
    const rect = el.getBoundingClientRect();
    if (rect.width > 0 && rect.height > 0 && (rect.width < 44 || rect.height < 44)) tapIssues++;
  });
  return { hasHorizontalScroll, tapIssues, tapTotal: tapTargets.length, tapElements };
})()"#;

#[derive(Debug, Default, Deserialize)]
struct VisibleCounts {
    nav: usize,
    content: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileMetrics {
    has_horizontal_scroll: bool,
    tap_issues: usize,
    tap_total: usize,
    tap_elements: Vec<TapTarget>,
}

struct ScoreInput {
    has_viewport_meta: bool,
    horizontal_scroll: bool,
    tap_issues: usize,
    tap_total: usize,
    desktop_total: usize,
    mobile_total: usize,
}

fn score(input: &ScoreInput) -> (u8, Vec<String>, usize) {
    let mut score: i32 = 100;
    let mut issues = Vec::new();

    if !input.has_viewport_meta {
        score -= 30;
        issues.push("Missing or incorrect viewport meta tag.".to_string());
    }
    if input.horizontal_scroll {
        score -= 30;
        issues.push("Page has horizontal scroll on mobile devices (layout overflow).".to_string());
    }
    if input.tap_issues > 0 {
        let ratio = input.tap_issues as f64 / input.tap_total.max(1) as f64;
        let penalty = ((ratio * 40.0).round() as i32).min(20);
        score -= penalty;
        if penalty > 5 {
            issues.push(format!(
                "{} interactive elements are too small (target size < {}px).",
                input.tap_issues, MIN_TAP_SIZE as u32
            ));
        }
    }

    let hidden = input.desktop_total.saturating_sub(input.mobile_total);
    if hidden as f64 > input.desktop_total as f64 * 0.3 {
        score -= 20;
        issues.push(format!(
            "High element inconsistency: {hidden} elements from desktop are hidden on mobile."
        ));
    }

    (score.clamp(0, 100) as u8, issues, hidden)
}

/// Switches the page to a mobile viewport and measures layout overflow,
/// tap-target sizing and content parity against the desktop rendering.
///
/// The viewport is left at mobile width; this checker runs after everything
/// that assumes desktop layout.
pub async fn run_responsive_check(session: &PageSession) -> Result<ResponsiveResults, ScanError> {
    debug!("Starting responsive design check.");
    let desktop: VisibleCounts = session.evaluate_as(VISIBLE_COUNT_SCRIPT).await?;

    session.set_viewport(Viewport::MOBILE).await?;
    tokio::time::sleep(MOBILE_SETTLE).await;

    let mobile_screenshot = match session.screenshot_data_uri(Screenshot::ViewportOnly).await {
        Ok(shot) => Some(shot),
        Err(e) => {
            warn!(error = %e, "Mobile screenshot failed, continuing without it.");
            None
        }
    };

    let viewport_meta: Option<String> = session.evaluate_as(VIEWPORT_META_SCRIPT).await?;
    let has_viewport_meta = viewport_meta
        .as_deref()
        .is_some_and(|v| v.contains("width=device-width"));

    let metrics: MobileMetrics = session.evaluate_as(MOBILE_METRICS_SCRIPT).await?;
    let mobile: VisibleCounts = session.evaluate_as(VISIBLE_COUNT_SCRIPT).await?;

    let desktop_total = desktop.nav + desktop.content;
    let mobile_total = mobile.nav + mobile.content;
    let (score, issues, hidden_on_mobile) = score(&ScoreInput {
        has_viewport_meta,
        horizontal_scroll: metrics.has_horizontal_scroll,
        tap_issues: metrics.tap_issues,
        tap_total: metrics.tap_total,
        desktop_total,
        mobile_total,
    });

    let results = ResponsiveResults {
        score,
        is_responsive: !metrics.has_horizontal_scroll && has_viewport_meta,
        has_viewport_meta,
        horizontal_scroll_mobile: metrics.has_horizontal_scroll,
        mobile_screenshot,
        element_consistency: ElementConsistency {
            desktop_visible: desktop_total,
            mobile_visible: mobile_total,
            hidden_on_mobile,
        },
        tap_targets: TapTargetSummary {
            issues: metrics.tap_issues,
            total: metrics.tap_total,
            elements: metrics.tap_elements,
        },
        issues,
    };
    info!(
        score = results.score,
        responsive = results.is_responsive,
        tap_issues = results.tap_targets.issues,
        "Responsive check finished."
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::fake::FakePage;
    use crate::core::browser::PageSession;
    use serde_json::json;

    fn input() -> ScoreInput {
        ScoreInput {
            has_viewport_meta: true,
            horizontal_scroll: false,
            tap_issues: 0,
            tap_total: 40,
            desktop_total: 50,
            mobile_total: 50,
        }
    }

    #[test]
    fn adaptive_page_scores_100() {
        let (s, issues, hidden) = score(&input());
        assert_eq!(s, 100);
        assert!(issues.is_empty());
        assert_eq!(hidden, 0);
    }

    #[test]
    fn missing_viewport_meta_and_overflow_each_cost_thirty() {
        let mut i = input();
        i.has_viewport_meta = false;
        i.horizontal_scroll = true;
        let (s, issues, _) = score(&i);
        assert_eq!(s, 40);
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn tap_penalty_is_proportional_and_capped_at_twenty() {
        // 4 of 40 -> ratio .1 -> penalty 4, below the issue threshold.
        let mut i = input();
        i.tap_issues = 4;
        let (s, issues, _) = score(&i);
        assert_eq!(s, 96);
        assert!(issues.is_empty());

        // 30 of 40 -> ratio .75 -> raw 30, capped at 20.
        let mut i = input();
        i.tap_issues = 30;
        let (s, issues, _) = score(&i);
        assert_eq!(s, 80);
        assert!(issues.iter().any(|m| m.contains("too small")));
    }

    #[test]
    fn hiding_a_third_of_desktop_content_costs_twenty() {
        let mut i = input();
        i.mobile_total = 30;
        let (s, issues, hidden) = score(&i);
        assert_eq!(hidden, 20);
        assert_eq!(s, 80);
        assert!(issues.iter().any(|m| m.contains("hidden on mobile")));
    }

    #[test]
    fn zero_tap_targets_do_not_divide_by_zero() {
        let mut i = input();
        i.tap_total = 0;
        let (s, _, _) = score(&i);
        assert_eq!(s, 100);
    }

    #[tokio::test]
    async fn switches_to_mobile_viewport_and_reports_metrics() {
        let page = FakePage::new()
            .on("getVisible", json!({"nav": 5, "content": 20}))
            .on("meta[name=\"viewport\"]", json!("width=device-width, initial-scale=1"))
            .on(
                "hasHorizontalScroll",
                json!({"hasHorizontalScroll": false, "tapIssues": 0, "tapTotal": 12, "tapElements": []}),
            );
        let viewports = page.viewports.clone();
        let session = PageSession::new(Box::new(page));
        let results = run_responsive_check(&session).await.unwrap();
        assert_eq!(results.score, 100);
        assert!(results.is_responsive);
        assert!(results.mobile_screenshot.is_some());
        assert_eq!(viewports.lock().unwrap().as_slice(), &[Viewport::MOBILE]);
    }
}
