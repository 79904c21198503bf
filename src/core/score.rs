// src/core/score.rs

use crate::core::config::Feature;
use tracing::debug;

/// Fixed category weights. They sum to 1.0 when every scored checker is
/// enabled; when some are disabled the aggregate divides by the sum of the
/// weights that actually ran, so toggling a feature off never silently
/// depresses the overall score.
pub fn weight(feature: Feature) -> f64 {
    match feature {
        Feature::Seo => 0.18,
        Feature::Headings => 0.08,
        Feature::Images => 0.08,
        Feature::Links => 0.12,
        Feature::Visual => 0.08,
        Feature::Performance => 0.13,
        Feature::Accessibility => 0.08,
        Feature::Responsive => 0.08,
        Feature::Security => 0.17,
        // Detection-only features never contribute to the score.
        Feature::TechStack | Feature::Sitemap => 0.0,
    }
}

/// Combines the sub-scores of the checkers that ran into one overall score.
///
/// # Arguments
/// * `sub_scores` - `(feature, score)` pairs for every checker that was
///   enabled and produced a result.
///
/// # Returns
/// The weighted mean rounded to the nearest integer, or 0 if no weighted
/// checker ran at all.
pub fn aggregate(sub_scores: &[(Feature, u8)]) -> u8 {
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for (feature, score) in sub_scores {
        let w = weight(*feature);
        weighted_sum += w * f64::from(*score);
        weight_sum += w;
    }
    if weight_sum <= 0.0 {
        debug!("No scored checkers ran, overall score defaults to 0.");
        return 0;
    }
    (weighted_sum / weight_sum).round() as u8
}

/// Human-readable label for a 0-100 score, as rendered by the report UI.
pub fn label(score: u8) -> &'static str {
    match score {
        90..=100 => "Excellent",
        75..=89 => "Good",
        60..=74 => "Average",
        40..=59 => "Poor",
        _ => "Critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_enabled_weights_sum_to_one() {
        use strum::IntoEnumIterator;
        let total: f64 = Feature::iter().map(weight).sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
    }

    #[test]
    fn renormalizes_over_enabled_checkers() {
        // seo=100 (w .18), headings=0 (w .08):
        // round(100*18 / 26) = 69
        let overall = aggregate(&[(Feature::Seo, 100), (Feature::Headings, 0)]);
        assert_eq!(overall, 69);
    }

    #[test]
    fn full_set_of_perfect_scores_is_100() {
        let subs = [
            (Feature::Seo, 100),
            (Feature::Headings, 100),
            (Feature::Images, 100),
            (Feature::Links, 100),
            (Feature::Visual, 100),
            (Feature::Performance, 100),
            (Feature::Accessibility, 100),
            (Feature::Responsive, 100),
            (Feature::Security, 100),
        ];
        assert_eq!(aggregate(&subs), 100);
    }

    #[test]
    fn no_checkers_ran_scores_zero() {
        assert_eq!(aggregate(&[]), 0);
        // Unscored detectors alone do not rescue the aggregate.
        assert_eq!(aggregate(&[(Feature::Sitemap, 100)]), 0);
    }

    #[test]
    fn score_labels_match_ui_scale() {
        assert_eq!(label(100), "Excellent");
        assert_eq!(label(90), "Excellent");
        assert_eq!(label(89), "Good");
        assert_eq!(label(75), "Good");
        assert_eq!(label(60), "Average");
        assert_eq!(label(40), "Poor");
        assert_eq!(label(39), "Critical");
    }
}
