// src/core/scanner/links.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::highlight::{capture_highlighted, ElementPredicate};
use crate::core::models::{
    clamp_score, ButtonDetail, DeadLink, LabeledScreenshot, LinkDetails, LinkResults,
};
use crate::core::scanner::truncate;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

/// How many links get a dead-link probe per scan.
const DEAD_LINK_PROBE_LIMIT: usize = 15;

fn extract_script(origin: &str) -> String {
    // The origin comes from the validated target URL, never from page data.
    format!(
        r#"(() => {{
  const origin = {origin};
  const links = Array.from(document.querySelectorAll('a'));
  const internal = [];
  const external = [];
  links.forEach((link) => {{
    const href = link.href;
    if (!href || href.startsWith('javascript:') || href.startsWith('#')) return;
    const text = (link.textContent || '').trim().substring(0, 80);
    const item = {{ href: href.substring(0, 200), text }};
    try {{
      if (new URL(href).origin === origin) internal.push(item);
      else external.push(item);
    }} catch {{
      internal.push(item);
    }}
  }});
  const buttons = Array.from(document.querySelectorAll(
    'button, [role="button"], input[type="button"], input[type="submit"]'
  ));
  const noLabel = buttons.filter((btn) =>
    !(btn.textContent || '').trim() && !btn.getAttribute('aria-label') && !btn.getAttribute('title')
  );
  return {{
    total: links.length,
    internal,
    external,
    buttonsNoLabel: noLabel.map((b) => ({{
      tag: b.tagName.toLowerCase(),
      html: b.outerHTML.substring(0, 150),
    }})),
  }};
}})()"#,
        origin = serde_json::Value::String(origin.to_string())
    )
}

fn probe_script(href: &str) -> String {
    // Probed from inside the page so same-site cookies and CORS behave as
    // they would for a real visitor; the href is JSON-encoded, never
    // spliced in raw.
    format!(
        r#"(async () => {{
  try {{
    const res = await fetch({href}, {{ method: 'HEAD', mode: 'no-cors' }});
    return res.status;
  }} catch {{
    return 0;
  }}
}})()"#,
        href = serde_json::Value::String(href.to_string())
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkSignals {
    total: usize,
    internal: Vec<RawLink>,
    external: Vec<RawLink>,
    buttons_no_label: Vec<RawButton>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    href: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawButton {
    tag: String,
    html: String,
}

fn score_links(dead: usize, unlabeled_buttons: usize) -> u8 {
    clamp_score(100 - dead as i32 * 15 - unlabeled_buttons as i32 * 10)
}

/// Partitions the page's anchors into internal/external sets, flags
/// unlabeled buttons and probes the first links for dead targets.
///
/// # Arguments
/// * `session` - The page session left on the target by navigation.
/// * `target` - The validated scan target, used for origin comparison.
pub async fn run_link_check(session: &PageSession, target: &Url) -> Result<LinkResults, ScanError> {
    debug!("Starting link and button check.");
    let signals: LinkSignals = session
        .evaluate_as(&extract_script(&target.origin().ascii_serialization()))
        .await?;

    let mut dead_links = Vec::new();
    let probe_targets = signals
        .internal
        .iter()
        .chain(signals.external.iter())
        .map(|l| l.href.clone())
        .take(DEAD_LINK_PROBE_LIMIT);
    for href in probe_targets {
        let status = match session.evaluate(&probe_script(&href)).await {
            Ok(value) => value.as_u64().unwrap_or(0) as u16,
            Err(e) => {
                warn!(href, error = %e, "Dead-link probe failed, treating as unreachable.");
                0
            }
        };
        if status >= 400 || status == 0 {
            dead_links.push(DeadLink {
                url: truncate(&href, 200),
                status,
            });
        }
    }

    let unlabeled = signals.buttons_no_label.len();
    let mut issues = Vec::new();
    if !dead_links.is_empty() {
        issues.push(format!("{} dead link(s) found", dead_links.len()));
    }
    if unlabeled > 0 {
        issues.push(format!("{unlabeled} button(s) without accessible label"));
    }
    let score = score_links(dead_links.len(), unlabeled);

    let mut screenshots = Vec::new();
    if unlabeled > 0 {
        if let Some(shot) = capture_highlighted(session, ElementPredicate::UnlabeledButton).await? {
            screenshots.push(LabeledScreenshot {
                label: format!("{unlabeled} button(s) without label"),
                image: shot,
            });
        }
    }

    let results = LinkResults {
        score,
        total: signals.total,
        internal: signals.internal.len(),
        external: signals.external.len(),
        dead_links,
        buttons_without_labels: unlabeled,
        issues,
        screenshots,
        details: LinkDetails {
            internal: signals
                .internal
                .into_iter()
                .map(|l| crate::core::models::LinkEntry { href: l.href, text: l.text })
                .collect(),
            external: signals
                .external
                .into_iter()
                .map(|l| crate::core::models::LinkEntry { href: l.href, text: l.text })
                .collect(),
            buttons_no_label: signals
                .buttons_no_label
                .into_iter()
                .map(|b| ButtonDetail { tag: b.tag, html: b.html })
                .collect(),
        },
    };
    info!(
        score = results.score,
        total = results.total,
        dead = results.dead_links.len(),
        "Link check finished."
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::browser::fake::FakePage;
    use crate::core::browser::PageSession;
    use serde_json::json;

    #[test]
    fn dead_links_cost_15_and_unlabeled_buttons_10() {
        assert_eq!(score_links(0, 0), 100);
        assert_eq!(score_links(2, 1), 60);
        assert_eq!(score_links(7, 0), 0);
    }

    #[test]
    fn probe_script_json_encodes_hostile_hrefs() {
        let script = probe_script("https://example.com/');fetch('https://evil.test");
        assert!(script.contains(r#""https://example.com/');fetch('https://evil.test""#));
        // The raw sequence must not appear outside the JSON string literal.
        assert!(!script.contains("fetch('https://evil.test'"));
    }

    fn signals(internal: usize) -> serde_json::Value {
        let links: Vec<_> = (0..internal)
            .map(|i| json!({"href": format!("https://site.test/p{i}"), "text": format!("page {i}")}))
            .collect();
        json!({
            "total": internal,
            "internal": links,
            "external": [],
            "buttonsNoLabel": []
        })
    }

    #[tokio::test]
    async fn probes_are_capped_at_fifteen_links() {
        let page = FakePage::new()
            .on("links.length", signals(40))
            .on("mode: 'no-cors'", json!(200));
        let evaluated = page.evaluated.clone();
        let session = PageSession::new(Box::new(page));
        let target = Url::parse("https://site.test/").unwrap();
        let results = run_link_check(&session, &target).await.unwrap();
        assert!(results.dead_links.is_empty());
        let probes = evaluated
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.contains("no-cors"))
            .count();
        assert_eq!(probes, DEAD_LINK_PROBE_LIMIT);
    }

    #[tokio::test]
    async fn error_statuses_and_network_failures_are_dead() {
        let page = FakePage::new()
            .on("links.length", signals(2))
            .on("mode: 'no-cors'", json!(404));
        let session = PageSession::new(Box::new(page));
        let target = Url::parse("https://site.test/").unwrap();
        let results = run_link_check(&session, &target).await.unwrap();
        assert_eq!(results.dead_links.len(), 2);
        assert_eq!(results.dead_links[0].status, 404);
        assert_eq!(results.score, 70);
        assert!(results.issues.iter().any(|i| i.contains("2 dead link(s)")));
    }

    #[tokio::test]
    async fn unlabeled_buttons_get_an_evidence_screenshot() {
        let page = FakePage::new()
            .on(
                "links.length",
                json!({
                    "total": 0,
                    "internal": [],
                    "external": [],
                    "buttonsNoLabel": [{"tag": "button", "html": "<button></button>"}]
                }),
            )
            .on("data-audit-mark", json!(1));
        let session = PageSession::new(Box::new(page));
        let target = Url::parse("https://site.test/").unwrap();
        let results = run_link_check(&session, &target).await.unwrap();
        assert_eq!(results.buttons_without_labels, 1);
        assert_eq!(results.score, 90);
        assert_eq!(results.screenshots.len(), 1);
    }
}
