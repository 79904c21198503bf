// src/core/scanner/visual.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{ContrastFailure, ContrastSummary, VisualResults};
use serde::Deserialize;
use tracing::{debug, info};

/// At most this many DOM nodes are style-sampled per page.
const SAMPLE_LIMIT: usize = 300;
/// At most this many itemized contrast failures are reported.
const FAILURE_LIMIT: usize = 20;
/// Palette listings (colors, backgrounds) are capped at this length.
const PALETTE_LIMIT: usize = 20;

/// Samples computed styles across the page and collects foreground and
/// effective background colors per text-bearing element. The effective
/// background walks up the ancestor chain past transparent layers.
const EXTRACT_SCRIPT: &str = r#"(() => {
  const elements = document.querySelectorAll('body, body *');
  const fonts = new Set();
  const fontSizes = new Set();
  const colors = new Set();
  const backgroundColors = new Set();
  const contrastPairs = [];

  const parseRgb = (c) => {
    const m = c.match(/rgba?\((\d+),\s*(\d+),\s*(\d+)/);
    return m ? [parseInt(m[1], 10), parseInt(m[2], 10), parseInt(m[3], 10)] : null;
  };

  const sampleSize = Math.min(elements.length, 300);
  const step = Math.max(1, Math.floor(elements.length / Math.max(1, sampleSize)));

  for (let i = 0; i < elements.length; i += step) {
    const el = elements[i];
    const style = getComputedStyle(el);
    if (style.fontFamily) fonts.add(style.fontFamily.split(',')[0].trim().replace(/['"]/g, ''));
    if (style.fontSize) fontSizes.add(style.fontSize);
    if (style.color && style.color !== 'rgba(0, 0, 0, 0)') colors.add(style.color);
    if (style.backgroundColor && style.backgroundColor !== 'rgba(0, 0, 0, 0)') backgroundColors.add(style.backgroundColor);

    const text = (el.textContent || '').trim().substring(0, 40);
    if (!text) continue;
    const fgRgb = parseRgb(style.color);
    let bgRgb = null;
    let walker = el;
    while (walker) {
      const ws = getComputedStyle(walker);
      const bg = parseRgb(ws.backgroundColor);
      if (bg && !(bg[0] === 0 && bg[1] === 0 && bg[2] === 0 && ws.backgroundColor.includes('0)'))) {
        bgRgb = bg;
        break;
      }
      walker = walker.parentElement;
    }
    if (!bgRgb) bgRgb = [255, 255, 255];
    if (fgRgb) {
      contrastPairs.push({
        element: el.tagName.toLowerCase(),
        text,
        fg: style.color,
        bg: `rgb(${bgRgb.join(',')})`,
        fgRgb,
        bgRgb,
        fontSize: parseFloat(style.fontSize) || 0,
        isBold: parseInt(style.fontWeight, 10) >= 700 || style.fontWeight === 'bold',
      });
    }
  }

  return {
    fonts: Array.from(fonts),
    fontSizes: Array.from(fontSizes).sort(),
    colors: Array.from(colors),
    backgroundColors: Array.from(backgroundColors),
    contrastPairs,
  };
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisualSignals {
    fonts: Vec<String>,
    font_sizes: Vec<String>,
    colors: Vec<String>,
    background_colors: Vec<String>,
    contrast_pairs: Vec<ContrastPair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContrastPair {
    element: String,
    text: String,
    fg: String,
    bg: String,
    fg_rgb: [u8; 3],
    bg_rgb: [u8; 3],
    font_size: f64,
    is_bold: bool,
}

fn srgb_to_linear(channel: u8) -> f64 {
    let s = f64::from(channel) / 255.0;
    if s <= 0.03928 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance of an sRGB color.
fn luminance(rgb: [u8; 3]) -> f64 {
    0.2126 * srgb_to_linear(rgb[0]) + 0.7152 * srgb_to_linear(rgb[1]) + 0.0722 * srgb_to_linear(rgb[2])
}

/// WCAG contrast ratio, always >= 1.
fn contrast_ratio(fg: [u8; 3], bg: [u8; 3]) -> f64 {
    let l1 = luminance(fg);
    let l2 = luminance(bg);
    (l1.max(l2) + 0.05) / (l1.min(l2) + 0.05)
}

fn is_large_text(font_size: f64, is_bold: bool) -> bool {
    font_size >= 18.0 || (is_bold && font_size >= 14.0)
}

fn rating(score: u8) -> &'static str {
    match score {
        95..=100 => "AAA",
        80..=94 => "AA",
        60..=79 => "A",
        _ => "Fail",
    }
}

fn analyze(signals: VisualSignals) -> VisualResults {
    let mut pass_aa = 0;
    let mut fail_aa = 0;
    let mut pass_aaa = 0;
    let mut fail_aaa = 0;
    let mut failures = Vec::new();

    for pair in &signals.contrast_pairs {
        let ratio = contrast_ratio(pair.fg_rgb, pair.bg_rgb);
        let large = is_large_text(pair.font_size, pair.is_bold);
        let required_aa = if large { 3.0 } else { 4.5 };
        let required_aaa = if large { 4.5 } else { 7.0 };

        if ratio >= required_aa {
            pass_aa += 1;
        } else {
            fail_aa += 1;
            if failures.len() < FAILURE_LIMIT {
                failures.push(ContrastFailure {
                    element: pair.element.clone(),
                    text: pair.text.clone(),
                    fg: pair.fg.clone(),
                    bg: pair.bg.clone(),
                    ratio: (ratio * 100.0).round() / 100.0,
                    required: required_aa,
                });
            }
        }
        if ratio >= required_aaa {
            pass_aaa += 1;
        } else {
            fail_aaa += 1;
        }
    }

    let total = pass_aa + fail_aa;
    let pass_rate = if total > 0 { pass_aa as f64 / total as f64 } else { 1.0 };
    let score = (pass_rate * 100.0).round() as u8;

    let mut issues = Vec::new();
    if score < 80 {
        issues.push(format!(
            "WCAG contrast issues: {fail_aa} element(s) fail AA requirements (4.5:1)"
        ));
    }
    if fail_aaa > 0 {
        issues.push(format!("{fail_aaa} element(s) fail stricter AAA requirements (7:1)"));
    }

    let mut colors = signals.colors;
    colors.truncate(PALETTE_LIMIT);
    let mut background_colors = signals.background_colors;
    background_colors.truncate(PALETTE_LIMIT);

    VisualResults {
        score,
        contrast: ContrastSummary {
            score,
            rating: rating(score).to_string(),
            total_checked: total,
            pass_aa,
            fail_aa,
            pass_aaa,
            fail_aaa,
            failures,
        },
        fonts: signals.fonts,
        font_sizes: signals.font_sizes,
        colors,
        background_colors,
        issues,
    }
}

/// Runs the visual consistency and WCAG contrast audit over a sample of up
/// to 300 page elements.
pub async fn run_visual_check(session: &PageSession) -> Result<VisualResults, ScanError> {
    debug!(sample_limit = SAMPLE_LIMIT, "Starting visual contrast analysis.");
    let signals: VisualSignals = session.evaluate_as(EXTRACT_SCRIPT).await?;
    let results = analyze(signals);
    info!(
        score = results.score,
        checked = results.contrast.total_checked,
        fail_aa = results.contrast.fail_aa,
        "Visual check finished."
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(fg: [u8; 3], bg: [u8; 3], font_size: f64, is_bold: bool) -> ContrastPair {
        ContrastPair {
            element: "p".to_string(),
            text: "sample".to_string(),
            fg: format!("rgb({},{},{})", fg[0], fg[1], fg[2]),
            bg: format!("rgb({},{},{})", bg[0], bg[1], bg[2]),
            fg_rgb: fg,
            bg_rgb: bg,
            font_size,
            is_bold,
        }
    }

    fn with_pairs(pairs: Vec<ContrastPair>) -> VisualSignals {
        VisualSignals {
            contrast_pairs: pairs,
            ..VisualSignals::default()
        }
    }

    #[test]
    fn black_on_white_passes_aa_and_aaa() {
        let ratio = contrast_ratio([0, 0, 0], [255, 255, 255]);
        assert!((ratio - 21.0).abs() < 0.01);
        let results = analyze(with_pairs(vec![pair([0, 0, 0], [255, 255, 255], 16.0, false)]));
        assert_eq!(results.contrast.pass_aa, 1);
        assert_eq!(results.contrast.pass_aaa, 1);
        assert_eq!(results.score, 100);
        assert_eq!(results.contrast.rating, "AAA");
    }

    #[test]
    fn light_gray_on_white_fails_both_levels() {
        // rgb(200,200,200) on white is well below ratio 3.
        let ratio = contrast_ratio([200, 200, 200], [255, 255, 255]);
        assert!(ratio < 3.0);
        let results = analyze(with_pairs(vec![pair([200, 200, 200], [255, 255, 255], 16.0, false)]));
        assert_eq!(results.contrast.fail_aa, 1);
        assert_eq!(results.contrast.fail_aaa, 1);
        assert_eq!(results.score, 0);
        assert_eq!(results.contrast.rating, "Fail");
        assert_eq!(results.contrast.failures.len(), 1);
        assert!((results.contrast.failures[0].required - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn large_text_gets_the_relaxed_threshold() {
        // Ratio ~3.9: fails normal AA (4.5) but passes large-text AA (3.0).
        let fg = [128, 128, 128];
        let ratio = contrast_ratio(fg, [255, 255, 255]);
        assert!(ratio > 3.0 && ratio < 4.5, "ratio was {ratio}");
        let normal = analyze(with_pairs(vec![pair(fg, [255, 255, 255], 16.0, false)]));
        assert_eq!(normal.contrast.fail_aa, 1);
        let large = analyze(with_pairs(vec![pair(fg, [255, 255, 255], 18.0, false)]));
        assert_eq!(large.contrast.pass_aa, 1);
        let bold = analyze(with_pairs(vec![pair(fg, [255, 255, 255], 14.0, true)]));
        assert_eq!(bold.contrast.pass_aa, 1);
    }

    #[test]
    fn score_is_the_aa_pass_rate() {
        let results = analyze(with_pairs(vec![
            pair([0, 0, 0], [255, 255, 255], 16.0, false),
            pair([0, 0, 0], [255, 255, 255], 16.0, false),
            pair([0, 0, 0], [255, 255, 255], 16.0, false),
            pair([200, 200, 200], [255, 255, 255], 16.0, false),
        ]));
        assert_eq!(results.score, 75);
        assert_eq!(results.contrast.rating, "A");
        assert!(results.issues.iter().any(|i| i.contains("fail AA")));
    }

    #[test]
    fn no_text_elements_means_a_clean_pass() {
        let results = analyze(with_pairs(Vec::new()));
        assert_eq!(results.score, 100);
        assert_eq!(results.contrast.total_checked, 0);
        assert!(results.issues.is_empty());
    }

    #[test]
    fn failure_list_and_palettes_are_capped() {
        let pairs: Vec<_> = (0..30)
            .map(|_| pair([200, 200, 200], [255, 255, 255], 16.0, false))
            .collect();
        let mut signals = with_pairs(pairs);
        signals.colors = (0..40).map(|i| format!("rgb({i},0,0)")).collect();
        let results = analyze(signals);
        assert_eq!(results.contrast.fail_aa, 30);
        assert_eq!(results.contrast.failures.len(), FAILURE_LIMIT);
        assert_eq!(results.colors.len(), PALETTE_LIMIT);
    }
}
