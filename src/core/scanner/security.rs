// src/core/scanner/security.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{
    clamp_score, CookieIssue, HeaderProbe, MixedContent, Recommendation, SecurityHeaders,
    SecurityResults,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Timeout for the out-of-band header probe.
const HEADER_PROBE_TIMEOUT: Duration = Duration::from_secs(8);
/// At most this many mixed-content URLs are itemized.
const MIXED_CONTENT_LIMIT: usize = 20;

/// Scans the rendered DOM for http:// subresources on the page and counts
/// inline event handlers and inline script blocks.
const PAGE_SCRIPT: &str = r#"(() => {
  const mixedContent = [];
  const candidates = document.querySelectorAll(
    'img[src], script[src], link[href], iframe[src], video[src], audio[src]'
  );
  candidates.forEach((el) => {
    const src = el.src || el.href;
    if (src && src.startsWith('http://') && mixedContent.length < 20) {
      mixedContent.push(src.substring(0, 150));
    }
  });

  let inlineScripts = 0;
  const handlers = ['onclick', 'onload', 'onerror', 'onmouseover', 'onfocus', 'onchange', 'onsubmit'];
  document.querySelectorAll('*').forEach((el) => {
    for (const h of handlers) {
      if (el.hasAttribute(h)) { inlineScripts++; break; }
    }
  });
  inlineScripts += document.querySelectorAll('script:not([src])').length;

  return { mixedContent, inlineScripts };
})()"#;

/// Cookie names are all the page exposes to scripts; flag attributes
/// cannot be read from here, so Secure is inferred from the transport and
/// HttpOnly is reported as missing for every script-visible cookie.
const COOKIE_SCRIPT: &str = r#"(() => {
  if (!document.cookie) return [];
  return document.cookie.split(';').map((c) => c.split('=')[0].trim()).filter(Boolean);
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSignals {
    mixed_content: Vec<String>,
    inline_scripts: usize,
}

fn probe(value: Option<&str>, max_len: usize) -> HeaderProbe {
    match value {
        Some(v) => HeaderProbe {
            present: true,
            value: Some(v.chars().take(max_len).collect()),
        },
        None => HeaderProbe::default(),
    }
}

/// Fetches the target once outside the browser to read its response
/// headers. Probe failure degrades to all-absent headers rather than
/// failing the checker.
async fn probe_headers(http: &reqwest::Client, target: &Url) -> SecurityHeaders {
    let response = match http
        .get(target.clone())
        .timeout(HEADER_PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Security header probe failed, reporting headers as absent.");
            return SecurityHeaders::default();
        }
    };
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    SecurityHeaders {
        hsts: probe(header("strict-transport-security").as_deref(), 300),
        csp: probe(header("content-security-policy").as_deref(), 300),
        x_frame_options: probe(header("x-frame-options").as_deref(), 300),
        x_content_type_options: probe(header("x-content-type-options").as_deref(), 300),
        referrer_policy: probe(header("referrer-policy").as_deref(), 300),
        permissions_policy: probe(header("permissions-policy").as_deref(), 200),
    }
}

struct Verdict {
    score: u8,
    issues: Vec<String>,
    recommendations: Vec<Recommendation>,
}

fn analyze(
    is_https: bool,
    headers: &SecurityHeaders,
    mixed_count: usize,
    cookie_count: usize,
) -> Verdict {
    let mut score: i32 = 100;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let mut recommend = |priority: &str, category: &str, message: &str| {
        recommendations.push(Recommendation {
            priority: priority.to_string(),
            category: category.to_string(),
            message: message.to_string(),
        });
    };

    if !is_https {
        score -= 30;
        issues.push("Site is not served over HTTPS".to_string());
        recommend(
            "Critical",
            "HTTPS",
            "Serve the site over HTTPS with a valid certificate.",
        );
    }
    if !headers.hsts.present {
        score -= 15;
        issues.push("Missing Strict-Transport-Security header".to_string());
        recommend(
            "High",
            "Strict-Transport-Security",
            "Add an HSTS header so browsers refuse downgraded connections.",
        );
    }
    if !headers.csp.present {
        score -= 15;
        issues.push("Missing Content-Security-Policy header".to_string());
        recommend(
            "High",
            "Content-Security-Policy",
            "Define a Content-Security-Policy to restrict script and resource origins.",
        );
    }
    if !headers.x_frame_options.present {
        score -= 10;
        issues.push("Missing X-Frame-Options header".to_string());
        recommend(
            "Medium",
            "X-Frame-Options",
            "Set X-Frame-Options (or frame-ancestors in CSP) to prevent clickjacking.",
        );
    }
    if !headers.x_content_type_options.present {
        score -= 5;
        issues.push("Missing X-Content-Type-Options header".to_string());
        recommend(
            "Medium",
            "X-Content-Type-Options",
            "Set X-Content-Type-Options: nosniff to disable MIME sniffing.",
        );
    }
    if !headers.referrer_policy.present {
        score -= 5;
        issues.push("Missing Referrer-Policy header".to_string());
        recommend(
            "Low",
            "Referrer-Policy",
            "Set a Referrer-Policy to limit URL leakage to third parties.",
        );
    }
    // Permissions-Policy is surfaced in the header table but carries no
    // deduction on its own.
    if is_https && mixed_count > 0 {
        score -= (mixed_count as i32 * 5).min(20);
        issues.push(format!(
            "{mixed_count} resource(s) loaded over insecure http://"
        ));
        recommend(
            "High",
            "Mixed Content",
            "Load all subresources over HTTPS; mixed content is blocked or downgraded by browsers.",
        );
    }
    if cookie_count > 0 {
        score -= (cookie_count as i32 * 3).min(10);
        issues.push(format!(
            "{cookie_count} cookie(s) readable from JavaScript without HttpOnly"
        ));
        recommend(
            "Medium",
            "Cookies",
            "Mark session cookies HttpOnly and Secure so scripts cannot read them.",
        );
    }

    Verdict {
        score: clamp_score(score),
        issues,
        recommendations,
    }
}

/// Runs the transport security audit: HTTPS use, response security
/// headers, mixed content, inline script usage and script-visible cookies.
///
/// # Arguments
/// * `session` - The page session left on the target by navigation.
/// * `http` - Shared HTTP client for the out-of-band header probe.
/// * `target` - The validated scan target.
pub async fn run_security_check(
    session: &PageSession,
    http: &reqwest::Client,
    target: &Url,
) -> Result<SecurityResults, ScanError> {
    debug!("Starting security check.");
    let is_https = target.scheme() == "https";
    let headers = probe_headers(http, target).await;

    let signals: PageSignals = session.evaluate_as(PAGE_SCRIPT).await?;
    let cookie_names: Vec<String> = session.evaluate_as(COOKIE_SCRIPT).await?;
    let cookie_issues: Vec<CookieIssue> = cookie_names
        .into_iter()
        .map(|name| CookieIssue {
            name,
            missing_secure: !is_https,
            missing_http_only: true,
        })
        .collect();

    let mut items = signals.mixed_content;
    items.truncate(MIXED_CONTENT_LIMIT);
    let mixed_content = MixedContent {
        count: items.len(),
        items,
    };

    let verdict = analyze(is_https, &headers, mixed_content.count, cookie_issues.len());
    let results = SecurityResults {
        score: verdict.score,
        is_https,
        headers,
        mixed_content,
        dangerous_inline_scripts: signals.inline_scripts,
        cookie_issues,
        issues: verdict.issues,
        recommendations: verdict.recommendations,
    };
    info!(
        score = results.score,
        https = results.is_https,
        mixed = results.mixed_content.count,
        "Security check finished."
    );
    Ok(results)
}
