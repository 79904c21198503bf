// src/core/scanner/sitemap.rs

use crate::core::models::{SitemapResults, SitemapUrl};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Timeout per sitemap or robots.txt fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// How many child sitemaps of an index get fetched.
const CHILD_SITEMAP_LIMIT: usize = 3;

static RE_URL_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<url>(.*?)</url>").unwrap());
static RE_SITEMAP_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<sitemap>(.*?)</sitemap>").unwrap());
static RE_LOC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").unwrap());
static RE_LASTMOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<lastmod>\s*(.*?)\s*</lastmod>").unwrap());
static RE_CHANGEFREQ: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<changefreq>\s*(.*?)\s*</changefreq>").unwrap());
static RE_PRIORITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<priority>\s*(.*?)\s*</priority>").unwrap());
static RE_ROBOTS_SITEMAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^sitemap:\s*(\S+)").unwrap());

fn capture(re: &Regex, block: &str) -> Option<String> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extracts `<url>` entries from a sitemap document.
fn parse_urls(xml: &str) -> Vec<SitemapUrl> {
    RE_URL_BLOCK
        .captures_iter(xml)
        .filter_map(|block| {
            let inner = block.get(1)?.as_str();
            let loc = capture(&RE_LOC, inner)?;
            Some(SitemapUrl {
                loc,
                lastmod: capture(&RE_LASTMOD, inner),
                changefreq: capture(&RE_CHANGEFREQ, inner),
                priority: capture(&RE_PRIORITY, inner),
            })
        })
        .collect()
}

/// Extracts child sitemap locations from a sitemap index document.
fn parse_index(xml: &str) -> Vec<String> {
    RE_SITEMAP_BLOCK
        .captures_iter(xml)
        .filter_map(|block| capture(&RE_LOC, block.get(1)?.as_str()))
        .collect()
}

fn is_index(xml: &str) -> bool {
    xml.contains("<sitemap>")
}

fn robots_sitemap_url(robots: &str) -> Option<String> {
    RE_ROBOTS_SITEMAP
        .captures(robots)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Fetch seam for the detector. Production goes through the shared reqwest
/// client; tests script responses per URL.
#[async_trait]
trait TextFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Option<String>;
}

#[async_trait]
impl TextFetcher for reqwest::Client {
    async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = self
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?;
        response.text().await.ok()
    }
}

/// Locates and parses the site's sitemap. Tries the two conventional
/// locations first, then falls back to the Sitemap directive in robots.txt.
/// All failures degrade to a result with the `error` field set; this
/// detector never fails the scan.
///
/// # Arguments
/// * `http` - Shared HTTP client.
/// * `target` - The validated scan target; only its origin is used.
pub async fn run_sitemap_detection(http: &reqwest::Client, target: &Url) -> SitemapResults {
    detect(http, target).await
}

async fn detect(fetcher: &dyn TextFetcher, target: &Url) -> SitemapResults {
    debug!("Starting sitemap detection.");
    let origin = target.origin().ascii_serialization();

    let mut candidates = vec![
        format!("{origin}/sitemap.xml"),
        format!("{origin}/sitemap_index.xml"),
    ];
    if let Some(robots) = fetcher.fetch_text(&format!("{origin}/robots.txt")).await {
        if let Some(custom) = robots_sitemap_url(&robots) {
            if !candidates.contains(&custom) {
                candidates.push(custom);
            }
        }
    }

    for candidate in candidates {
        let Some(xml) = fetcher.fetch_text(&candidate).await else {
            continue;
        };
        let urls = if is_index(&xml) {
            let mut urls = Vec::new();
            for child in parse_index(&xml).into_iter().take(CHILD_SITEMAP_LIMIT) {
                match fetcher.fetch_text(&child).await {
                    Some(child_xml) => urls.extend(parse_urls(&child_xml)),
                    None => warn!(child, "Child sitemap fetch failed, skipping."),
                }
            }
            urls
        } else {
            parse_urls(&xml)
        };
        if urls.is_empty() {
            continue;
        }
        info!(source = %candidate, urls = urls.len(), "Sitemap found.");
        return SitemapResults {
            urls,
            source: Some(candidate),
            error: None,
        };
    }

    info!("No sitemap found for target.");
    SitemapResults {
        urls: Vec::new(),
        source: None,
        error: Some("No sitemap found".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl TextFetcher for FakeFetcher {
        async fn fetch_text(&self, url: &str) -> Option<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned()
        }
    }

    fn target() -> Url {
        Url::parse("https://site.test/some/page").unwrap()
    }

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://site.test/</loc>
    <lastmod>2025-11-02</lastmod>
    <changefreq>daily</changefreq>
    <priority>1.0</priority>
  </url>
  <url>
    <loc>https://site.test/about</loc>
  </url>
</urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0"?>
<sitemapindex>
  <sitemap><loc>https://site.test/sitemap-posts.xml</loc></sitemap>
  <sitemap><loc>https://site.test/sitemap-pages.xml</loc></sitemap>
  <sitemap><loc>https://site.test/sitemap-tags.xml</loc></sitemap>
  <sitemap><loc>https://site.test/sitemap-authors.xml</loc></sitemap>
</sitemapindex>"#;

    #[test]
    fn url_entries_keep_their_optional_fields() {
        let urls = parse_urls(SITEMAP);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].loc, "https://site.test/");
        assert_eq!(urls[0].lastmod.as_deref(), Some("2025-11-02"));
        assert_eq!(urls[0].changefreq.as_deref(), Some("daily"));
        assert_eq!(urls[0].priority.as_deref(), Some("1.0"));
        assert!(urls[1].lastmod.is_none());
    }

    #[test]
    fn index_documents_are_recognized_and_enumerated() {
        assert!(is_index(INDEX));
        assert!(!is_index(SITEMAP));
        let children = parse_index(INDEX);
        assert_eq!(children.len(), 4);
        assert_eq!(children[0], "https://site.test/sitemap-posts.xml");
    }

    #[test]
    fn robots_directive_is_case_insensitive() {
        let robots = "User-agent: *\nDisallow: /admin\nSITEMAP: https://site.test/custom-map.xml\n";
        assert_eq!(
            robots_sitemap_url(robots).as_deref(),
            Some("https://site.test/custom-map.xml")
        );
        assert!(robots_sitemap_url("User-agent: *\n").is_none());
    }

    #[test]
    fn entries_without_loc_are_dropped() {
        let xml = "<urlset><url><lastmod>2025-01-01</lastmod></url></urlset>";
        assert!(parse_urls(xml).is_empty());
    }

    #[tokio::test]
    async fn conventional_location_wins_and_stops_the_search() {
        let fetcher = FakeFetcher::default().with("https://site.test/sitemap.xml", SITEMAP);
        let results = detect(&fetcher, &target()).await;
        assert_eq!(results.source.as_deref(), Some("https://site.test/sitemap.xml"));
        assert_eq!(results.urls.len(), 2);
        assert!(results.error.is_none());
        let requested = fetcher.requested.lock().unwrap();
        assert!(!requested.iter().any(|u| u.contains("sitemap_index")));
    }

    #[tokio::test]
    async fn robots_pointer_is_followed_when_conventional_locations_fail() {
        let fetcher = FakeFetcher::default()
            .with(
                "https://site.test/robots.txt",
                "User-agent: *\nSitemap: https://site.test/custom-map.xml\n",
            )
            .with("https://site.test/custom-map.xml", SITEMAP);
        let results = detect(&fetcher, &target()).await;
        assert_eq!(results.source.as_deref(), Some("https://site.test/custom-map.xml"));
        assert_eq!(results.urls.len(), 2);
        let requested = fetcher.requested.lock().unwrap();
        // Both conventional candidates are tried before the robots pointer.
        let custom_at = requested.iter().position(|u| u.ends_with("custom-map.xml")).unwrap();
        assert!(requested.iter().position(|u| u.ends_with("/sitemap.xml")).unwrap() < custom_at);
        assert!(requested.iter().position(|u| u.ends_with("/sitemap_index.xml")).unwrap() < custom_at);
    }

    #[tokio::test]
    async fn index_children_are_capped_at_three() {
        let child = "<urlset><url><loc>https://site.test/p</loc></url></urlset>";
        let fetcher = FakeFetcher::default()
            .with("https://site.test/sitemap.xml", INDEX)
            .with("https://site.test/sitemap-posts.xml", child)
            .with("https://site.test/sitemap-pages.xml", child)
            .with("https://site.test/sitemap-tags.xml", child)
            .with("https://site.test/sitemap-authors.xml", child);
        let results = detect(&fetcher, &target()).await;
        assert_eq!(results.urls.len(), CHILD_SITEMAP_LIMIT);
        let requested = fetcher.requested.lock().unwrap();
        assert!(!requested.iter().any(|u| u.ends_with("sitemap-authors.xml")));
    }

    #[tokio::test]
    async fn nothing_found_reports_an_error_instead_of_failing() {
        let fetcher = FakeFetcher::default();
        let results = detect(&fetcher, &target()).await;
        assert!(results.urls.is_empty());
        assert!(results.source.is_none());
        assert_eq!(results.error.as_deref(), Some("No sitemap found"));
    }
}
