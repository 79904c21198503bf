// src/core/highlight.rs

//! Annotated screenshot capture.
//!
//! Checkers that find problem elements (missing alt text, unlabeled
//! buttons, ...) call into here to produce screenshots with the offending
//! elements outlined and badged. Every predicate is a fixed selector plus a
//! fixed filter expression from the closed set below; scripts are assembled
//! from these compile-time constants only, never from page-derived strings.

use crate::core::browser::{PageSession, Screenshot};
use crate::core::error::ScanError;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Settle time after highlighting a whole group of elements.
const GROUP_SETTLE: Duration = Duration::from_millis(300);
/// Settle time after scrolling one element into view.
const ELEMENT_SETTLE: Duration = Duration::from_millis(150);
/// Cap on per-element screenshots for any single predicate.
pub const MAX_ELEMENT_SHOTS: usize = 15;

/// The problem classes we know how to highlight. Each variant binds a CSS
/// selector and a JS filter over `el` that decides whether a matched
/// element actually exhibits the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementPredicate {
    /// `<img>` without an alt attribute.
    MissingAlt,
    /// `<img>` that finished loading with zero natural width.
    BrokenImage,
    /// Buttons with no text, aria-label, or title (dead-link checker view).
    UnlabeledButton,
    /// Buttons with no text or aria-label (accessibility checker view,
    /// which does not accept `title` as a label).
    ButtonNoLabel,
    /// Anchors with no text content or aria-label.
    LinkWithoutText,
    /// Form fields with no associated label, aria-label, or aria-labelledby.
    InputWithoutLabel,
}

impl ElementPredicate {
    pub fn selector(&self) -> &'static str {
        match self {
            ElementPredicate::MissingAlt | ElementPredicate::BrokenImage => "img",
            ElementPredicate::UnlabeledButton => {
                "button, [role=\"button\"], input[type=\"button\"], input[type=\"submit\"]"
            }
            ElementPredicate::ButtonNoLabel => "button, [role=\"button\"]",
            ElementPredicate::LinkWithoutText => "a",
            ElementPredicate::InputWithoutLabel => "input, select, textarea",
        }
    }

    /// Filter expression evaluated with `el` bound to each selector match.
    /// These must agree exactly with the counting logic of the checker that
    /// uses them, or screenshots and counts drift apart.
    pub fn filter_js(&self) -> &'static str {
        match self {
            ElementPredicate::MissingAlt => "!el.hasAttribute('alt')",
            ElementPredicate::BrokenImage => "el.naturalWidth === 0 && el.src",
            ElementPredicate::UnlabeledButton => {
                "!(el.textContent || '').trim() && !el.getAttribute('aria-label') && !el.getAttribute('title')"
            }
            ElementPredicate::ButtonNoLabel | ElementPredicate::LinkWithoutText => {
                "!(el.textContent || '').trim() && !el.getAttribute('aria-label')"
            }
            ElementPredicate::InputWithoutLabel => {
                "!el.getAttribute('aria-label') && !el.getAttribute('aria-labelledby') && !(el.getAttribute('id') && document.querySelector('label[for=\"' + el.getAttribute('id') + '\"]'))"
            }
        }
    }

    pub fn highlight_color(&self) -> &'static str {
        match self {
            ElementPredicate::MissingAlt => "#f97316",
            ElementPredicate::BrokenImage => "#ef4444",
            ElementPredicate::UnlabeledButton | ElementPredicate::ButtonNoLabel => "#eab308",
            ElementPredicate::LinkWithoutText => "#a855f7",
            ElementPredicate::InputWithoutLabel => "#ec4899",
        }
    }

    pub fn badge_text(&self) -> &'static str {
        match self {
            ElementPredicate::MissingAlt => "no alt",
            ElementPredicate::BrokenImage => "broken",
            ElementPredicate::UnlabeledButton | ElementPredicate::ButtonNoLabel => "no label",
            ElementPredicate::LinkWithoutText => "no text",
            ElementPredicate::InputWithoutLabel => "no label",
        }
    }
}

fn mark_script(predicate: ElementPredicate) -> String {
    format!(
        r#"(() => {{
  const matches = Array.from(document.querySelectorAll('{selector}'))
    .filter((el) => {filter});
  matches.forEach((el) => {{
    el.setAttribute('data-audit-mark', 'true');
    el.style.outline = '3px solid {color}';
    el.style.outlineOffset = '2px';
    el.style.boxShadow = '0 0 0 4px {color}33';
    const badge = document.createElement('span');
    badge.setAttribute('data-audit-badge', 'true');
    badge.textContent = '{badge}';
    badge.style.cssText = 'position:absolute;top:0;left:0;transform:translateY(-100%);background:{color};color:#fff;font:10px/1.6 sans-serif;padding:0 6px;border-radius:3px;z-index:2147483647;pointer-events:none;white-space:nowrap;';
    const host = el.parentElement || document.body;
    if (getComputedStyle(host).position === 'static') {{
      host.style.position = 'relative';
    }}
    host.appendChild(badge);
  }});
  if (matches.length > 0) {{
    matches[0].scrollIntoView({{ block: 'center' }});
  }}
  return matches.length;
}})()"#,
        selector = predicate.selector(),
        filter = predicate.filter_js(),
        color = predicate.highlight_color(),
        badge = predicate.badge_text(),
    )
}

fn focus_script(predicate: ElementPredicate, index: usize) -> String {
    format!(
        r#"(() => {{
  const matches = Array.from(document.querySelectorAll('{selector}'))
    .filter((el) => {filter});
  const el = matches[{index}];
  if (!el) return false;
  el.style.outline = '3px solid {color}';
  el.style.outlineOffset = '2px';
  el.scrollIntoView({{ block: 'center' }});
  return true;
}})()"#,
        selector = predicate.selector(),
        filter = predicate.filter_js(),
        index = index,
        color = predicate.highlight_color(),
    )
}

const CLEANUP_SCRIPT: &str = r#"(() => {
  document.querySelectorAll('[data-audit-mark]').forEach((el) => {
    el.style.outline = '';
    el.style.outlineOffset = '';
    el.style.boxShadow = '';
    el.removeAttribute('data-audit-mark');
  });
  document.querySelectorAll('[data-audit-badge]').forEach((badge) => badge.remove());
})()"#;

/// Highlights every element matching `predicate` at once, scrolls the first
/// into view and captures a single viewport screenshot.
///
/// # Returns
/// `Ok(None)` when no element matched; the page is left unmodified in that
/// case. Highlight markup is always removed before returning.
pub async fn capture_highlighted(
    session: &PageSession,
    predicate: ElementPredicate,
) -> Result<Option<String>, ScanError> {
    let marked = session.evaluate(&mark_script(predicate)).await?;
    let count = marked.as_u64().unwrap_or(0);
    if count == 0 {
        return Ok(None);
    }
    debug!(?predicate, count, "Capturing highlighted group screenshot.");
    tokio::time::sleep(GROUP_SETTLE).await;
    let shot = session.screenshot_data_uri(Screenshot::ViewportOnly).await;
    // Best effort: a failed cleanup only affects later screenshots of the
    // same page, never the scan result.
    if let Err(e) = session.evaluate(CLEANUP_SCRIPT).await {
        warn!(error = %e, "Highlight cleanup failed.");
    }
    shot.map(Some)
}

/// Captures one screenshot per matching element, up to [`MAX_ELEMENT_SHOTS`].
///
/// The returned vector has one entry per attempted element; an entry is
/// `None` when that particular capture failed, so callers can still pair
/// screenshots with their element metadata by position.
pub async fn capture_element_screenshots(
    session: &PageSession,
    predicate: ElementPredicate,
    count: usize,
) -> Result<Vec<Option<String>>, ScanError> {
    let take = count.min(MAX_ELEMENT_SHOTS);
    let mut shots = Vec::with_capacity(take);
    for index in 0..take {
        let focused = session.evaluate(&focus_script(predicate, index)).await?;
        if focused != Value::Bool(true) {
            shots.push(None);
            continue;
        }
        tokio::time::sleep(ELEMENT_SETTLE).await;
        match session.screenshot_data_uri(Screenshot::ViewportOnly).await {
            Ok(uri) => shots.push(Some(uri)),
            Err(e) => {
                warn!(?predicate, index, error = %e, "Element screenshot failed.");
                shots.push(None);
            }
        }
    }
    if let Err(e) = session.evaluate(CLEANUP_SCRIPT).await {
        warn!(error = %e, "Highlight cleanup failed.");
    }
    Ok(shots)
}
