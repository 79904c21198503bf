// src/core/scanner/accessibility.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::highlight::{
    capture_element_screenshots, capture_highlighted, ElementPredicate,
};
use crate::core::models::{
    clamp_score, AccessibilityDetails, AccessibilityResults, ButtonNoLabel, ImageNoAlt,
    InputNoLabel, LabeledScreenshot, LinkNoText,
};
use serde::Deserialize;
use tracing::{debug, info};

/// One pass over the DOM collecting every unlabeled element per category,
/// using the same filters as the highlight predicates.
const EXTRACT_SCRIPT: &str = r#"(() => {
  const imgsNoAlt = Array.from(document.querySelectorAll('img'))
    .filter((el) => !el.hasAttribute('alt'));
  const linksNoText = Array.from(document.querySelectorAll('a'))
    .filter((el) => !(el.textContent || '').trim() && !el.getAttribute('aria-label'));
  const buttonsNoLabel = Array.from(document.querySelectorAll('button, [role="button"]'))
    .filter((el) => !(el.textContent || '').trim() && !el.getAttribute('aria-label'));
  const inputsNoLabel = Array.from(document.querySelectorAll('input, select, textarea'))
    .filter((el) => {
      const id = el.getAttribute('id');
      const hasLabel = id ? document.querySelector('label[for="' + id + '"]') : null;
      return !hasLabel && !el.getAttribute('aria-label') && !el.getAttribute('aria-labelledby');
    });
  const ariaUsage = document.querySelectorAll(
    '[aria-label], [aria-labelledby], [aria-describedby], [role]'
  ).length;
  return {
    ariaUsage,
    imagesNoAlt: imgsNoAlt.map((i) => ({
      src: (i.src || i.getAttribute('data-src') || '').substring(0, 200),
      width: i.width,
      height: i.height,
    })),
    linksNoText: linksNoText.map((l) => ({
      href: (l.href || '').substring(0, 200),
      html: l.outerHTML.substring(0, 150),
    })),
    buttonsNoLabel: buttonsNoLabel.map((b) => ({
      tag: b.tagName.toLowerCase(),
      html: b.outerHTML.substring(0, 150),
    })),
    inputsNoLabel: inputsNoLabel.map((inp) => ({
      tag: inp.tagName.toLowerCase(),
      type: inp.getAttribute('type') || 'text',
      name: inp.getAttribute('name') || '',
      id: inp.getAttribute('id') || '',
    })),
  };
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct A11ySignals {
    aria_usage: usize,
    images_no_alt: Vec<RawImage>,
    links_no_text: Vec<RawLink>,
    buttons_no_label: Vec<RawButton>,
    inputs_no_label: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    src: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    href: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct RawButton {
    tag: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    tag: String,
    #[serde(rename = "type")]
    input_type: String,
    name: String,
    id: String,
}

fn issue_list(signals: &A11ySignals) -> Vec<String> {
    let mut issues = Vec::new();
    if !signals.images_no_alt.is_empty() {
        issues.push(format!("{} image(s) without alt text", signals.images_no_alt.len()));
    }
    if !signals.links_no_text.is_empty() {
        issues.push(format!(
            "{} link(s) without descriptive text",
            signals.links_no_text.len()
        ));
    }
    if !signals.buttons_no_label.is_empty() {
        issues.push(format!("{} button(s) without labels", signals.buttons_no_label.len()));
    }
    if !signals.inputs_no_label.is_empty() {
        issues.push(format!(
            "{} form input(s) without labels",
            signals.inputs_no_label.len()
        ));
    }
    issues
}

/// Pairs detail items with their per-element screenshots by position;
/// missing captures simply leave the slot empty.
fn zip_screenshot<T>(items: &mut [T], shots: Vec<Option<String>>, set: impl Fn(&mut T, Option<String>)) {
    let mut shots = shots.into_iter();
    for item in items.iter_mut() {
        set(item, shots.next().flatten());
    }
}

async fn category_shot(
    session: &PageSession,
    predicate: ElementPredicate,
    label: String,
    screenshots: &mut Vec<LabeledScreenshot>,
) -> Result<(), ScanError> {
    if let Some(shot) = capture_highlighted(session, predicate).await? {
        screenshots.push(LabeledScreenshot { label, image: shot });
    }
    Ok(())
}

/// Runs the DOM-heuristic accessibility audit: unlabeled images, links,
/// buttons and form controls, with per-element and per-category evidence
/// screenshots. Each problem category present costs 20 points.
pub async fn run_accessibility_check(
    session: &PageSession,
) -> Result<AccessibilityResults, ScanError> {
    debug!("Starting accessibility audit.");
    let signals: A11ySignals = session.evaluate_as(EXTRACT_SCRIPT).await?;
    let issues = issue_list(&signals);
    let score = clamp_score(100 - issues.len() as i32 * 20);

    let mut details = AccessibilityDetails {
        images_no_alt: signals
            .images_no_alt
            .iter()
            .map(|i| ImageNoAlt {
                src: i.src.clone(),
                width: i.width,
                height: i.height,
                screenshot: None,
            })
            .collect(),
        links_no_text: signals
            .links_no_text
            .iter()
            .map(|l| LinkNoText {
                href: l.href.clone(),
                html: l.html.clone(),
                screenshot: None,
            })
            .collect(),
        buttons_no_label: signals
            .buttons_no_label
            .iter()
            .map(|b| ButtonNoLabel {
                tag: b.tag.clone(),
                html: b.html.clone(),
                screenshot: None,
            })
            .collect(),
        inputs_no_label: signals
            .inputs_no_label
            .iter()
            .map(|i| InputNoLabel {
                tag: i.tag.clone(),
                input_type: i.input_type.clone(),
                name: i.name.clone(),
                id: i.id.clone(),
                screenshot: None,
            })
            .collect(),
    };

    if !details.images_no_alt.is_empty() {
        let shots = capture_element_screenshots(
            session,
            ElementPredicate::MissingAlt,
            details.images_no_alt.len(),
        )
        .await?;
        zip_screenshot(&mut details.images_no_alt, shots, |i, s| i.screenshot = s);
    }
    if !details.links_no_text.is_empty() {
        let shots = capture_element_screenshots(
            session,
            ElementPredicate::LinkWithoutText,
            details.links_no_text.len(),
        )
        .await?;
        zip_screenshot(&mut details.links_no_text, shots, |l, s| l.screenshot = s);
    }
    if !details.buttons_no_label.is_empty() {
        let shots = capture_element_screenshots(
            session,
            ElementPredicate::ButtonNoLabel,
            details.buttons_no_label.len(),
        )
        .await?;
        zip_screenshot(&mut details.buttons_no_label, shots, |b, s| b.screenshot = s);
    }
    if !details.inputs_no_label.is_empty() {
        let shots = capture_element_screenshots(
            session,
            ElementPredicate::InputWithoutLabel,
            details.inputs_no_label.len(),
        )
        .await?;
        zip_screenshot(&mut details.inputs_no_label, shots, |i, s| i.screenshot = s);
    }

    let mut screenshots = Vec::new();
    if !details.images_no_alt.is_empty() {
        category_shot(
            session,
            ElementPredicate::MissingAlt,
            format!("{} image(s) without alt text", details.images_no_alt.len()),
            &mut screenshots,
        )
        .await?;
    }
    if !details.links_no_text.is_empty() {
        category_shot(
            session,
            ElementPredicate::LinkWithoutText,
            format!("{} link(s) without text", details.links_no_text.len()),
            &mut screenshots,
        )
        .await?;
    }
    if !details.buttons_no_label.is_empty() {
        category_shot(
            session,
            ElementPredicate::ButtonNoLabel,
            format!("{} button(s) without label", details.buttons_no_label.len()),
            &mut screenshots,
        )
        .await?;
    }
    if !details.inputs_no_label.is_empty() {
        category_shot(
            session,
            ElementPredicate::InputWithoutLabel,
            format!("{} input(s) without label", details.inputs_no_label.len()),
            &mut screenshots,
        )
        .await?;
    }

    let results = AccessibilityResults {
        score,
        images_without_alt: details.images_no_alt.len(),
        links_without_text: details.links_no_text.len(),
        buttons_without_labels: details.buttons_no_label.len(),
        inputs_without_labels: details.inputs_no_label.len(),
        aria_usage: signals.aria_usage,
        issues,
        screenshots,
        details,
    };
    info!(
        score = results.score,
        aria_usage = results.aria_usage,
        "Accessibility check finished."
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::fake::FakePage;
    use crate::core::browser::PageSession;
    use serde_json::json;

    fn signals_json(imgs: usize, links: usize, buttons: usize, inputs: usize) -> serde_json::Value {
        json!({
            "ariaUsage": 7,
            "imagesNoAlt": (0..imgs).map(|i| json!({"src": format!("/i{i}.png"), "width": 10, "height": 10})).collect::<Vec<_>>(),
            "linksNoText": (0..links).map(|i| json!({"href": format!("/l{i}"), "html": "<a></a>"})).collect::<Vec<_>>(),
            "buttonsNoLabel": (0..buttons).map(|_| json!({"tag": "button", "html": "<button></button>"})).collect::<Vec<_>>(),
            "inputsNoLabel": (0..inputs).map(|i| json!({"tag": "input", "type": "text", "name": format!("n{i}"), "id": ""})).collect::<Vec<_>>(),
        })
    }

    #[tokio::test]
    async fn clean_page_scores_100_with_no_screenshots() {
        let page = FakePage::new().on("ariaUsage", signals_json(0, 0, 0, 0));
        let session = PageSession::new(Box::new(page));
        let results = run_accessibility_check(&session).await.unwrap();
        assert_eq!(results.score, 100);
        assert!(results.issues.is_empty());
        assert!(results.screenshots.is_empty());
        assert_eq!(results.aria_usage, 7);
    }

    #[tokio::test]
    async fn each_problem_category_costs_twenty_points() {
        let page = FakePage::new()
            .on("ariaUsage", signals_json(3, 2, 0, 1))
            .on("data-audit-mark", json!(1))
            .on("matches[", json!(true));
        let session = PageSession::new(Box::new(page));
        let results = run_accessibility_check(&session).await.unwrap();
        // Three categories present regardless of how many elements each has.
        assert_eq!(results.issues.len(), 3);
        assert_eq!(results.score, 40);
        assert_eq!(results.images_without_alt, 3);
        assert_eq!(results.links_without_text, 2);
        assert_eq!(results.inputs_without_labels, 1);
    }

    #[tokio::test]
    async fn detail_items_carry_their_element_screenshots() {
        let page = FakePage::new()
            .on("ariaUsage", signals_json(2, 0, 0, 0))
            .on("data-audit-mark", json!(2))
            .on("matches[", json!(true));
        let session = PageSession::new(Box::new(page));
        let results = run_accessibility_check(&session).await.unwrap();
        assert_eq!(results.details.images_no_alt.len(), 2);
        assert!(results.details.images_no_alt.iter().all(|i| i.screenshot.is_some()));
        assert_eq!(results.screenshots.len(), 1);
    }

    #[tokio::test]
    async fn all_four_categories_floor_the_score_at_twenty() {
        let page = FakePage::new()
            .on("ariaUsage", signals_json(1, 1, 1, 1))
            .on("data-audit-mark", json!(1))
            .on("matches[", json!(true));
        let session = PageSession::new(Box::new(page));
        let results = run_accessibility_check(&session).await.unwrap();
        assert_eq!(results.score, 20);
        assert_eq!(results.issues.len(), 4);
    }
}
