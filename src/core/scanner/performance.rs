// src/core/scanner/performance.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{
    MetricReport, PerformanceMetrics, PerformanceResults, Recommendation, ResourceBreakdown,
    ResourceKind, ResourceSample,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

fn format_size(bytes: u64) -> String {
    if bytes < KB {
        format!("{bytes}B")
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    }
}

fn metric_rating(score: u8) -> &'static str {
    match score {
        90..=100 => "AAA",
        70..=89 => "AA",
        50..=69 => "A",
        _ => "Fail",
    }
}

fn metric(score: i32, details: Vec<String>) -> MetricReport {
    let score = score.clamp(0, 100) as u8;
    MetricReport {
        score,
        rating: metric_rating(score).to_string(),
        details,
    }
}

struct ResourceTotals {
    total_size: u64,
    total_requests: usize,
    js_size: u64,
    js_count: usize,
    css_size: u64,
    css_count: usize,
    image_size: u64,
    image_count: usize,
    large_images: usize,
    breakdown: Vec<ResourceBreakdown>,
}

fn summarize(resources: &[ResourceSample]) -> ResourceTotals {
    let mut by_kind: BTreeMap<ResourceKind, (usize, u64)> = BTreeMap::new();
    for sample in resources {
        let entry = by_kind.entry(sample.kind).or_default();
        entry.0 += 1;
        entry.1 += sample.size_bytes;
    }
    let kind = |k: ResourceKind| by_kind.get(&k).copied().unwrap_or_default();
    let (js_count, js_size) = kind(ResourceKind::Js);
    let (css_count, css_size) = kind(ResourceKind::Css);
    let (image_count, image_size) = kind(ResourceKind::Image);

    ResourceTotals {
        total_size: resources.iter().map(|r| r.size_bytes).sum(),
        total_requests: resources.len(),
        js_size,
        js_count,
        css_size,
        css_count,
        image_size,
        image_count,
        large_images: resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Image && r.size_bytes > 200 * KB)
            .count(),
        breakdown: by_kind
            .into_iter()
            .map(|(kind, (count, size))| ResourceBreakdown {
                kind,
                count,
                size: format_size(size),
                size_bytes: size,
            })
            .collect(),
    }
}

fn page_weight_metric(t: &ResourceTotals) -> MetricReport {
    let mut score = 100;
    let mut details = Vec::new();
    let total = format_size(t.total_size);
    if t.total_size > 5 * MB {
        score -= 40;
        details.push(format!("Total page size {total} exceeds 5MB (target < 3MB)"));
    } else if t.total_size > 3 * MB {
        score -= 20;
        details.push(format!("Total page size {total} (target < 3MB for optimal loading)"));
    } else if t.total_size > 3 * MB / 2 {
        score -= 10;
        details.push(format!("Page size {total}, good but could be optimized"));
    } else {
        details.push(format!("Page size {total} (excellent)"));
    }

    let js = format_size(t.js_size);
    if t.js_size > MB {
        score -= 15;
        details.push(format!("JavaScript total {js}, consider code splitting (target < 500KB)"));
    } else if t.js_size > 500 * KB {
        score -= 5;
        details.push(format!("JavaScript {js}, consider lazy loading modules"));
    } else {
        details.push(format!("JavaScript {js} (within budget)"));
    }

    let css = format_size(t.css_size);
    if t.css_size > 300 * KB {
        score -= 10;
        details.push(format!("CSS total {css}, consider removing unused CSS"));
    } else {
        details.push(format!("CSS {css} (within budget)"));
    }
    metric(score, details)
}

fn resource_count_metric(t: &ResourceTotals) -> MetricReport {
    let mut score = 100;
    let mut details = Vec::new();
    let n = t.total_requests;
    if n > 150 {
        score -= 35;
        details.push(format!("{n} HTTP requests, significantly impacts load time (target < 50)"));
    } else if n > 80 {
        score -= 20;
        details.push(format!("{n} HTTP requests, consider bundling (target < 50)"));
    } else if n > 50 {
        score -= 10;
        details.push(format!("{n} requests, slightly above optimal"));
    } else {
        details.push(format!("{n} requests (optimal)"));
    }
    if t.js_count > 20 {
        score -= 10;
        details.push(format!("{} JS files, bundle to reduce requests", t.js_count));
    }
    if t.css_count > 10 {
        score -= 5;
        details.push(format!("{} CSS files, consolidate stylesheets", t.css_count));
    }
    metric(score, details)
}

fn dom_complexity_metric(dom_elements: u64) -> MetricReport {
    let mut score = 100;
    let mut details = Vec::new();
    if dom_elements > 3000 {
        score -= 40;
        details.push(format!("{dom_elements} DOM elements, excessive (target < 1500)"));
    } else if dom_elements > 1500 {
        score -= 20;
        details.push(format!("{dom_elements} DOM elements, above recommended (target < 1500)"));
    } else if dom_elements > 800 {
        score -= 5;
        details.push(format!("{dom_elements} DOM elements, moderate"));
    } else {
        details.push(format!("{dom_elements} DOM elements (lean DOM)"));
    }
    metric(score, details)
}

fn image_optimization_metric(t: &ResourceTotals) -> MetricReport {
    let mut score = 100;
    let mut details = Vec::new();
    if t.image_count == 0 {
        details.push("No images detected".to_string());
        return metric(score, details);
    }
    let weight = format_size(t.image_size);
    if t.image_size > 2 * MB {
        score -= 30;
        details.push(format!("Total image weight {weight}, compress images (target < 1MB)"));
    } else if t.image_size > MB {
        score -= 15;
        details.push(format!("Image weight {weight}, consider next-gen formats (WebP/AVIF)"));
    } else {
        details.push(format!("Image weight {weight} (good)"));
    }
    if t.large_images > 0 {
        score -= t.large_images as i32 * 5;
        details.push(format!("{} image(s) > 200KB, resize and compress", t.large_images));
    } else {
        details.push("No oversized images detected".to_string());
    }
    let ratio = t.image_size as f64 / t.total_size.max(1) as f64;
    if ratio > 0.7 {
        score -= 10;
        details.push(format!(
            "Images are {}% of page weight, optimize aggressively",
            (ratio * 100.0).round()
        ));
    }
    metric(score, details)
}

fn load_speed_metric(load_time_ms: u64) -> MetricReport {
    let mut score = 100;
    let mut details = Vec::new();
    let seconds = load_time_ms as f64 / 1000.0;
    if load_time_ms > 8000 {
        score -= 40;
        details.push(format!("Load time {seconds:.1}s, critical (target < 3s)"));
    } else if load_time_ms > 5000 {
        score -= 25;
        details.push(format!("Load time {seconds:.1}s, slow (target < 3s)"));
    } else if load_time_ms > 3000 {
        score -= 10;
        details.push(format!("Load time {seconds:.1}s, needs improvement (target < 3s)"));
    } else {
        details.push(format!("Load time {seconds:.1}s (fast)"));
    }
    metric(score, details)
}

fn recommendations(t: &ResourceTotals, dom_elements: u64, load_time_ms: u64) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let rec = |priority: &str, category: &str, message: String| Recommendation {
        priority: priority.to_string(),
        category: category.to_string(),
        message,
    };
    if t.total_size > 3 * MB {
        recs.push(rec(
            "High",
            "Page Weight",
            format!(
                "Reduce total page size from {} to under 3MB. Audit large resources.",
                format_size(t.total_size)
            ),
        ));
    }
    if t.js_size > 500 * KB {
        recs.push(rec(
            "High",
            "JavaScript",
            format!(
                "{} of JS loaded. Use code splitting, tree shaking, and lazy imports.",
                format_size(t.js_size)
            ),
        ));
    }
    if t.large_images > 0 {
        recs.push(rec(
            "High",
            "Images",
            format!(
                "{} image(s) over 200KB. Use WebP/AVIF, resize to display dimensions, and add loading=\"lazy\".",
                t.large_images
            ),
        ));
    }
    if t.total_requests > 80 {
        recs.push(rec(
            "Medium",
            "Requests",
            format!(
                "{} HTTP requests. Bundle JS/CSS, use image sprites, and inline critical resources.",
                t.total_requests
            ),
        ));
    }
    if dom_elements > 1500 {
        recs.push(rec(
            "Medium",
            "DOM",
            format!("{dom_elements} DOM elements. Virtualize long lists, remove hidden elements, simplify layout."),
        ));
    }
    if load_time_ms > 3000 {
        recs.push(rec(
            "Medium",
            "Speed",
            format!(
                "{:.1}s load time. Defer non-critical JS, preload key resources, use CDN.",
                load_time_ms as f64 / 1000.0
            ),
        ));
    }
    if t.css_count > 5 {
        recs.push(rec(
            "Low",
            "CSS",
            format!("{} CSS files. Consolidate and remove unused styles.", t.css_count),
        ));
    }
    recs
}

fn analyze(resources: &[ResourceSample], dom_elements: u64, load_time_ms: u64) -> PerformanceResults {
    let totals = summarize(resources);

    let page_weight = page_weight_metric(&totals);
    let resource_count = resource_count_metric(&totals);
    let dom_complexity = dom_complexity_metric(dom_elements);
    let image_optimization = image_optimization_metric(&totals);
    let load_speed = load_speed_metric(load_time_ms);

    let score = (f64::from(page_weight.score) * 0.25
        + f64::from(resource_count.score) * 0.20
        + f64::from(dom_complexity.score) * 0.15
        + f64::from(image_optimization.score) * 0.25
        + f64::from(load_speed.score) * 0.15)
        .round() as u8;

    let mut issues = Vec::new();
    if score < 70 {
        issues.push("Overall performance needs significant improvement".to_string());
    }
    if load_time_ms > 5000 {
        issues.push(format!(
            "Slow page load ({:.1}s), exceeds 5s threshold",
            load_time_ms as f64 / 1000.0
        ));
    }
    if totals.total_size > 5 * MB {
        issues.push(format!("Excessive page size ({})", format_size(totals.total_size)));
    }
    if totals.total_requests > 100 {
        issues.push(format!("Too many HTTP requests ({})", totals.total_requests));
    }

    PerformanceResults {
        score,
        load_time_ms,
        total_resources: totals.total_requests,
        total_page_size: format_size(totals.total_size),
        total_page_size_bytes: totals.total_size,
        dom_elements,
        recommendations: recommendations(&totals, dom_elements, load_time_ms),
        resource_breakdown: totals.breakdown,
        metrics: PerformanceMetrics {
            page_weight,
            resource_count,
            dom_complexity,
            image_optimization,
            load_speed,
        },
        issues,
    }
}

/// Scores page weight, request count, DOM size, image optimization and load
/// speed from the observed network responses plus one DOM count query.
///
/// # Arguments
/// * `session` - The page session left on the target by navigation.
/// * `resources` - Every response sample observed since navigation began.
/// * `load_time_ms` - Wall-clock navigation time.
pub async fn run_performance_check(
    session: &PageSession,
    resources: &[ResourceSample],
    load_time_ms: u64,
) -> Result<PerformanceResults, ScanError> {
    debug!(samples = resources.len(), load_time_ms, "Starting performance analysis.");
    let dom_elements: u64 = session
        .evaluate_as("document.querySelectorAll('*').length")
        .await?;
    let results = analyze(resources, dom_elements, load_time_ms);
    info!(
        score = results.score,
        total_size = results.total_page_size_bytes,
        requests = results.total_resources,
        "Performance check finished."
    );
    Ok(results)
}
