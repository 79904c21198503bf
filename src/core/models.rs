// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Shared building blocks ---

/// A screenshot captured as evidence for a group of flagged elements,
/// encoded inline as a data URI. No screenshot is ever written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledScreenshot {
    pub label: String,
    pub image: String,
}

/// Classification of one observed network response, by content type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Js,
    Css,
    Image,
    Font,
    Html,
    Other,
}

impl ResourceKind {
    /// Maps a `content-type` header value onto a resource class by
    /// substring match, the same table the response observer uses.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.contains("javascript") {
            ResourceKind::Js
        } else if content_type.contains("css") {
            ResourceKind::Css
        } else if content_type.contains("image") {
            ResourceKind::Image
        } else if content_type.contains("font") {
            ResourceKind::Font
        } else if content_type.contains("html") {
            ResourceKind::Html
        } else {
            ResourceKind::Other
        }
    }
}

/// One network response observed while the page loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSample {
    pub kind: ResourceKind,
    pub size_bytes: u64,
    pub url: String,
}

/// Priority-tiered, human-readable remediation advice attached to the
/// performance and security sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: String,
    pub category: String,
    pub message: String,
}

// --- SEO Checker Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    Good,
    Missing,
    TooShort,
    TooLong,
}

/// Presence/length verdict for a single SEO-relevant tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagCheck {
    pub value: Option<String>,
    pub length: usize,
    pub status: TagStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoResults {
    pub score: u8,
    pub title: TagCheck,
    pub meta_description: TagCheck,
    pub canonical: Option<String>,
    pub og_tags: BTreeMap<String, String>,
    pub robots: Option<String>,
    pub language: Option<String>,
    pub favicon: Option<String>,
    pub viewport: Option<String>,
    pub issues: Vec<String>,
}

// --- Heading Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heading {
    pub tag: String,
    pub text: String,
    pub level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingResults {
    pub score: u8,
    pub structure: Vec<Heading>,
    pub h1_count: usize,
    pub issues: Vec<String>,
}

// --- Image Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetail {
    pub src: String,
    pub alt: Option<String>,
    pub has_alt: bool,
    pub status: String,
    pub width: u32,
    pub height: u32,
    pub loading: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResults {
    pub score: u8,
    pub total: usize,
    pub with_alt: usize,
    pub without_alt: usize,
    pub broken: usize,
    pub lazy_loaded: usize,
    pub details: Vec<ImageDetail>,
    pub issues: Vec<String>,
    pub screenshots: Vec<LabeledScreenshot>,
}

// --- Link Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEntry {
    pub href: String,
    pub text: String,
}

/// A probed link that answered with an error status. Status 0 means the
/// request itself failed (network error, blocked, unreachable).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLink {
    pub url: String,
    pub status: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonDetail {
    pub tag: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDetails {
    pub internal: Vec<LinkEntry>,
    pub external: Vec<LinkEntry>,
    pub buttons_no_label: Vec<ButtonDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResults {
    pub score: u8,
    pub total: usize,
    pub internal: usize,
    pub external: usize,
    pub dead_links: Vec<DeadLink>,
    pub buttons_without_labels: usize,
    pub issues: Vec<String>,
    pub screenshots: Vec<LabeledScreenshot>,
    pub details: LinkDetails,
}

// --- Visual/Contrast Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrastFailure {
    pub element: String,
    pub text: String,
    pub fg: String,
    pub bg: String,
    pub ratio: f64,
    pub required: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastSummary {
    pub score: u8,
    pub rating: String,
    pub total_checked: usize,
    pub pass_aa: usize,
    pub fail_aa: usize,
    pub pass_aaa: usize,
    pub fail_aaa: usize,
    pub failures: Vec<ContrastFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualResults {
    pub score: u8,
    pub contrast: ContrastSummary,
    pub fonts: Vec<String>,
    pub font_sizes: Vec<String>,
    pub colors: Vec<String>,
    pub background_colors: Vec<String>,
    pub issues: Vec<String>,
}

// --- Performance Checker Models ---

/// One scored sub-metric with its AAA/AA/A/Fail rating and itemized notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReport {
    pub score: u8,
    pub rating: String,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub page_weight: MetricReport,
    pub resource_count: MetricReport,
    pub dom_complexity: MetricReport,
    pub image_optimization: MetricReport,
    pub load_speed: MetricReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBreakdown {
    pub kind: ResourceKind,
    pub count: usize,
    pub size: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceResults {
    pub score: u8,
    pub load_time_ms: u64,
    pub total_resources: usize,
    pub total_page_size: String,
    pub total_page_size_bytes: u64,
    pub dom_elements: u64,
    pub resource_breakdown: Vec<ResourceBreakdown>,
    pub metrics: PerformanceMetrics,
    pub recommendations: Vec<Recommendation>,
    pub issues: Vec<String>,
}

// --- Accessibility Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageNoAlt {
    pub src: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkNoText {
    pub href: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonNoLabel {
    pub tag: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputNoLabel {
    pub tag: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityDetails {
    pub images_no_alt: Vec<ImageNoAlt>,
    pub links_no_text: Vec<LinkNoText>,
    pub buttons_no_label: Vec<ButtonNoLabel>,
    pub inputs_no_label: Vec<InputNoLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityResults {
    pub score: u8,
    pub images_without_alt: usize,
    pub links_without_text: usize,
    pub buttons_without_labels: usize,
    pub inputs_without_labels: usize,
    pub aria_usage: usize,
    pub issues: Vec<String>,
    pub screenshots: Vec<LabeledScreenshot>,
    pub details: AccessibilityDetails,
}

// --- Responsive Checker Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapTarget {
    pub html: String,
    pub width: i64,
    pub height: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapTargetSummary {
    pub issues: usize,
    pub total: usize,
    pub elements: Vec<TapTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementConsistency {
    pub desktop_visible: usize,
    pub mobile_visible: usize,
    pub hidden_on_mobile: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsiveResults {
    pub score: u8,
    pub is_responsive: bool,
    pub has_viewport_meta: bool,
    pub horizontal_scroll_mobile: bool,
    pub mobile_screenshot: Option<String>,
    pub element_consistency: ElementConsistency,
    pub tap_targets: TapTargetSummary,
    pub issues: Vec<String>,
}

// --- Security Checker Models ---

/// Presence and raw value of one security response header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderProbe {
    pub present: bool,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeaders {
    pub hsts: HeaderProbe,
    pub csp: HeaderProbe,
    pub x_frame_options: HeaderProbe,
    pub x_content_type_options: HeaderProbe,
    pub referrer_policy: HeaderProbe,
    pub permissions_policy: HeaderProbe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieIssue {
    pub name: String,
    pub missing_secure: bool,
    pub missing_http_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MixedContent {
    pub count: usize,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityResults {
    pub score: u8,
    pub is_https: bool,
    pub headers: SecurityHeaders,
    pub mixed_content: MixedContent,
    pub dangerous_inline_scripts: usize,
    pub cookie_issues: Vec<CookieIssue>,
    pub issues: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

// --- Tech-Stack Detector Models ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A detected technology (framework, CMS, analytics tool, language).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technology {
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub server: Option<String>,
    pub powered_by: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechStackResults {
    pub detected: Vec<Technology>,
    pub server_info: ServerInfo,
    pub total_detected: usize,
}

// --- Sitemap Detector Models ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapUrl {
    pub loc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitemapResults {
    pub urls: Vec<SitemapUrl>,
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// --- Main Report ---

// One report per scan request. Sections for disabled or failed checkers are
// absent from the serialized document, never null-with-zeroes; the overall
// score is renormalized over whatever actually ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub url: String,
    pub scan_date: DateTime<Utc>,
    pub overall_score: u8,
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headings: Option<HeadingResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<LinkResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<AccessibilityResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsive: Option<ResponsiveResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<TechStackResults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitemap: Option<SitemapResults>,
}

/// Clamps an additive penalty score into the 0..=100 range every checker
/// guarantees.
pub fn clamp_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_classification() {
        assert_eq!(
            ResourceKind::from_content_type("application/javascript; charset=utf-8"),
            ResourceKind::Js
        );
        assert_eq!(ResourceKind::from_content_type("text/css"), ResourceKind::Css);
        assert_eq!(ResourceKind::from_content_type("image/webp"), ResourceKind::Image);
        assert_eq!(ResourceKind::from_content_type("font/woff2"), ResourceKind::Font);
        assert_eq!(ResourceKind::from_content_type("text/html"), ResourceKind::Html);
        assert_eq!(
            ResourceKind::from_content_type("application/octet-stream"),
            ResourceKind::Other
        );
    }

    #[test]
    fn score_clamping() {
        assert_eq!(clamp_score(-40), 0);
        assert_eq!(clamp_score(0), 0);
        assert_eq!(clamp_score(69), 69);
        assert_eq!(clamp_score(140), 100);
    }

    #[test]
    fn disabled_sections_are_absent_from_json() {
        let report = ScanReport {
            url: "https://example.com/".into(),
            scan_date: Utc::now(),
            overall_score: 0,
            screenshot: None,
            seo: None,
            headings: None,
            images: None,
            links: None,
            visual: None,
            performance: None,
            accessibility: None,
            responsive: None,
            security: None,
            tech_stack: None,
            sitemap: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("seo").is_none());
        assert!(json.get("security").is_none());
        // The screenshot slot stays present (nullable), it is not a feature key.
        assert!(json.get("screenshot").is_some());
    }
}
