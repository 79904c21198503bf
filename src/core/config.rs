// src/core/config.rs

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// The feature checkers a scan can run. Nine of them carry a weight in the
/// overall score; tech-stack and sitemap detection are best-effort and
/// unscored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Feature {
    Seo,
    Headings,
    Images,
    Links,
    Visual,
    Performance,
    Accessibility,
    Responsive,
    Security,
    TechStack,
    Sitemap,
}

fn enabled() -> bool {
    true
}

/// Per-feature toggles, loaded from an optional JSON config file. A missing
/// file or missing key means the feature is enabled; disabling a feature
/// removes its key from the report and its weight from the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureConfig {
    #[serde(default = "enabled")]
    pub seo: bool,
    #[serde(default = "enabled")]
    pub headings: bool,
    #[serde(default = "enabled")]
    pub images: bool,
    #[serde(default = "enabled")]
    pub links: bool,
    #[serde(default = "enabled")]
    pub visual: bool,
    #[serde(default = "enabled")]
    pub performance: bool,
    #[serde(default = "enabled")]
    pub accessibility: bool,
    #[serde(default = "enabled")]
    pub responsive: bool,
    #[serde(default = "enabled")]
    pub security: bool,
    #[serde(default = "enabled")]
    pub tech_stack: bool,
    #[serde(default = "enabled")]
    pub sitemap: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            seo: true,
            headings: true,
            images: true,
            links: true,
            visual: true,
            performance: true,
            accessibility: true,
            responsive: true,
            security: true,
            tech_stack: true,
            sitemap: true,
        }
    }
}

impl FeatureConfig {
    /// Loads the toggles from a JSON file. An absent file yields the
    /// all-enabled default; an unreadable or malformed file does the same
    /// but logs the problem, so a bad config can never block scanning.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Self>(&raw) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded feature configuration.");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed feature config, using defaults.");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read feature config, using defaults.");
                Self::default()
            }
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Seo => self.seo,
            Feature::Headings => self.headings,
            Feature::Images => self.images,
            Feature::Links => self.links,
            Feature::Visual => self.visual,
            Feature::Performance => self.performance,
            Feature::Accessibility => self.accessibility,
            Feature::Responsive => self.responsive,
            Feature::Security => self.security,
            Feature::TechStack => self.tech_stack,
            Feature::Sitemap => self.sitemap,
        }
    }
}
