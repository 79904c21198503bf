// src/core/scanner/tech_stack.rs

use crate::core::browser::PageSession;
use crate::core::error::ScanError;
use crate::core::models::{Confidence, ServerInfo, TechStackResults, Technology};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Timeout for the server-header HEAD request.
const SERVER_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One sweep over the rendered page collecting the raw signals every
/// detection rule matches against: exposed globals, script and stylesheet
/// URLs, the generator meta tag, a bounded markup snippet and doctype.
const SWEEP_SCRIPT: &str = r#"(() => {
  const candidates = [
    'React', '__NEXT_DATA__', 'Vue', '__NUXT__', 'jQuery', 'Shopify', 'Drupal',
    'fbq', 'hj', 'mixpanel', 'amplitude', 'clarity', 'dataLayer', 'gsap',
    'Swiper', 'Chart', 'd3', 'THREE', 'Stripe', 'grecaptcha', 'Intercom',
    'Sentry', 'axios', 'moment',
  ];
  const globals = candidates.filter((name) => window[name] !== undefined);

  const scriptSrcs = Array.from(document.querySelectorAll('script[src]'))
    .slice(0, 100)
    .map((s) => s.src.substring(0, 300));
  const stylesheets = Array.from(document.querySelectorAll('link[rel="stylesheet"][href]'))
    .slice(0, 100)
    .map((l) => l.href.substring(0, 300));

  const generatorEl = document.querySelector('meta[name="generator"]');
  const generator = generatorEl ? generatorEl.getAttribute('content') : null;

  const ngEl = document.querySelector('[ng-version]');
  const ngVersion = ngEl ? ngEl.getAttribute('ng-version') : null;

  const versions = {};
  try { if (window.React && window.React.version) versions.react = window.React.version; } catch (e) {}
  try { if (window.jQuery && window.jQuery.fn) versions.jquery = window.jQuery.fn.jquery; } catch (e) {}
  try { if (window.Vue && window.Vue.version) versions.vue = window.Vue.version; } catch (e) {}
  try { if (window.next && window.next.version) versions.next = window.next.version; } catch (e) {}

  const hasModuleScripts = !!document.querySelector('script[type="module"]');
  const hasTsSourcemaps = Array.from(document.scripts)
    .some((s) => (s.textContent || '').includes('.ts.map'));

  let doctype = null;
  const dt = document.doctype;
  if (dt) {
    if (!dt.publicId && dt.name.toLowerCase() === 'html') doctype = 'html5';
    else if (dt.publicId && dt.publicId.includes('XHTML')) doctype = 'xhtml';
    else if (dt.publicId) doctype = 'html4';
  }

  return {
    globals,
    scriptSrcs,
    stylesheets,
    generator,
    body: document.documentElement.outerHTML.substring(0, 30000),
    ngVersion,
    versions,
    hasModuleScripts,
    hasTsSourcemaps,
    doctype,
  };
})()"#;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TechSignals {
    globals: Vec<String>,
    script_srcs: Vec<String>,
    stylesheets: Vec<String>,
    generator: Option<String>,
    body: String,
    ng_version: Option<String>,
    versions: HashMap<String, String>,
    has_module_scripts: bool,
    has_ts_sourcemaps: bool,
    doctype: Option<String>,
}

/// Where a detection rule looks for its pattern.
enum Check {
    /// A global the page exposed on `window`.
    Global(&'static str),
    /// A pattern in a `<script src>` URL.
    ScriptSrc(&'static Lazy<Regex>),
    /// A pattern in a stylesheet `href`.
    Stylesheet(&'static Lazy<Regex>),
    /// A pattern anywhere in the markup snippet.
    Body(&'static Lazy<Regex>),
    /// A pattern in the generator meta tag, capture group 1 is the version.
    Generator(&'static Lazy<Regex>),
}

/// Where a detected technology's version comes from, if anywhere.
enum VersionHint {
    None,
    /// A key in the in-page `versions` map.
    Key(&'static str),
    /// The `ng-version` attribute Angular stamps on its root element.
    NgVersion,
    /// Capture group 1 of the generator regex.
    FromGenerator,
}

struct Rule {
    name: &'static str,
    category: &'static str,
    confidence: Confidence,
    check: Check,
    version: VersionHint,
}

static RE_NEXT_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/_next/static/").unwrap());
static RE_SVELTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"class=["'][^"']*svelte-"#).unwrap());
static RE_VUE_APP: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-v-app|data-v-[0-9a-f]{8}").unwrap());
static RE_BOOTSTRAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)bootstrap(\.min)?\.css").unwrap());
static RE_TAILWIND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tailwind").unwrap());
static RE_BULMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)bulma(\.min)?\.css").unwrap());
static RE_MATERIALIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)materialize(\.min)?\.css").unwrap());
static RE_FOUNDATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)foundation(\.min)?\.css").unwrap());
static RE_FONT_AWESOME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)font-?awesome").unwrap());
static RE_WORDPRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/wp-content/|/wp-includes/").unwrap());
static RE_WP_GENERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"WordPress ?([\d.]+)?").unwrap());
static RE_SHOPIFY_CDN: Lazy<Regex> = Lazy::new(|| Regex::new(r"cdn\.shopify\.com").unwrap());
static RE_WIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"wixstatic\.com|parastorage\.com").unwrap());
static RE_SQUARESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)squarespace").unwrap());
static RE_WEBFLOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)webflow").unwrap());
static RE_GHOST_GENERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Ghost ?([\d.]+)?").unwrap());
static RE_JOOMLA_GENERATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Joomla!?").unwrap());
static RE_DRUPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)drupal").unwrap());
static RE_GA: Lazy<Regex> = Lazy::new(|| Regex::new(r"google-analytics\.com|googletagmanager\.com/gtag").unwrap());
static RE_GTM: Lazy<Regex> = Lazy::new(|| Regex::new(r"googletagmanager\.com/gtm").unwrap());
static RE_META_PIXEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"connect\.facebook\.net").unwrap());
static RE_HOTJAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"static\.hotjar\.com").unwrap());
static RE_CLARITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"clarity\.ms").unwrap());
static RE_FRAMER: Lazy<Regex> = Lazy::new(|| Regex::new(r"framerusercontent\.com").unwrap());
static RE_FRAMER_MOTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"framer-motion").unwrap());
static RE_GSAP_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)gsap(\.min)?\.js").unwrap());
static RE_SWIPER_CSS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)swiper").unwrap());
static RE_STRIPE_JS: Lazy<Regex> = Lazy::new(|| Regex::new(r"js\.stripe\.com").unwrap());
static RE_GOOGLE_MAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"maps\.googleapis\.com").unwrap());
static RE_RECAPTCHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"google\.com/recaptcha|gstatic\.com/recaptcha").unwrap());
static RE_SENTRY_CDN: Lazy<Regex> = Lazy::new(|| Regex::new(r"sentry-cdn\.com|browser\.sentry").unwrap());
static RE_LODASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)lodash(\.min)?\.js").unwrap());
static RE_TYPEKIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"use\.typekit\.net").unwrap());
static RE_GOOGLE_FONTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"fonts\.googleapis\.com").unwrap());
static RE_JSDELIVR: Lazy<Regex> = Lazy::new(|| Regex::new(r"cdn\.jsdelivr\.net").unwrap());
static RE_CDNJS: Lazy<Regex> = Lazy::new(|| Regex::new(r"cdnjs\.cloudflare\.com").unwrap());
static RE_UNPKG: Lazy<Regex> = Lazy::new(|| Regex::new(r"unpkg\.com").unwrap());
static RE_REACT_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"data-reactroot|react-dom").unwrap());

/// The master rule table. Rules are applied in order; the first match per
/// technology name wins, so version-bearing rules come first.
static RULES: &[Rule] = &[
    Rule { name: "React", category: "JS Library", confidence: Confidence::High, check: Check::Global("React"), version: VersionHint::Key("react") },
    Rule { name: "React", category: "JS Library", confidence: Confidence::Medium, check: Check::Body(&RE_REACT_MARKUP), version: VersionHint::None },
    Rule { name: "Next.js", category: "JS Framework", confidence: Confidence::High, check: Check::Global("__NEXT_DATA__"), version: VersionHint::Key("next") },
    Rule { name: "Next.js", category: "JS Framework", confidence: Confidence::High, check: Check::ScriptSrc(&RE_NEXT_SCRIPT), version: VersionHint::None },
    Rule { name: "Vue.js", category: "JS Framework", confidence: Confidence::High, check: Check::Global("Vue"), version: VersionHint::Key("vue") },
    Rule { name: "Vue.js", category: "JS Framework", confidence: Confidence::Medium, check: Check::Body(&RE_VUE_APP), version: VersionHint::None },
    Rule { name: "Nuxt.js", category: "JS Framework", confidence: Confidence::High, check: Check::Global("__NUXT__"), version: VersionHint::None },
    Rule { name: "Svelte", category: "JS Framework", confidence: Confidence::Medium, check: Check::Body(&RE_SVELTE), version: VersionHint::None },
    Rule { name: "jQuery", category: "JS Library", confidence: Confidence::High, check: Check::Global("jQuery"), version: VersionHint::Key("jquery") },
    Rule { name: "Bootstrap", category: "CSS Framework", confidence: Confidence::High, check: Check::Stylesheet(&RE_BOOTSTRAP), version: VersionHint::None },
    Rule { name: "Tailwind CSS", category: "CSS Framework", confidence: Confidence::Medium, check: Check::Stylesheet(&RE_TAILWIND), version: VersionHint::None },
    Rule { name: "Bulma", category: "CSS Framework", confidence: Confidence::High, check: Check::Stylesheet(&RE_BULMA), version: VersionHint::None },
    Rule { name: "Materialize", category: "CSS Framework", confidence: Confidence::High, check: Check::Stylesheet(&RE_MATERIALIZE), version: VersionHint::None },
    Rule { name: "Foundation", category: "CSS Framework", confidence: Confidence::High, check: Check::Stylesheet(&RE_FOUNDATION), version: VersionHint::None },
    Rule { name: "Font Awesome", category: "Icon Library", confidence: Confidence::High, check: Check::Stylesheet(&RE_FONT_AWESOME), version: VersionHint::None },
    Rule { name: "WordPress", category: "CMS", confidence: Confidence::High, check: Check::Generator(&RE_WP_GENERATOR), version: VersionHint::FromGenerator },
    Rule { name: "WordPress", category: "CMS", confidence: Confidence::High, check: Check::Body(&RE_WORDPRESS), version: VersionHint::None },
    Rule { name: "Shopify", category: "E-commerce", confidence: Confidence::High, check: Check::Global("Shopify"), version: VersionHint::None },
    Rule { name: "Shopify", category: "E-commerce", confidence: Confidence::High, check: Check::ScriptSrc(&RE_SHOPIFY_CDN), version: VersionHint::None },
    Rule { name: "Wix", category: "Website Builder", confidence: Confidence::High, check: Check::Body(&RE_WIX), version: VersionHint::None },
    Rule { name: "Squarespace", category: "Website Builder", confidence: Confidence::High, check: Check::Body(&RE_SQUARESPACE), version: VersionHint::None },
    Rule { name: "Webflow", category: "Website Builder", confidence: Confidence::High, check: Check::Body(&RE_WEBFLOW), version: VersionHint::None },
    Rule { name: "Ghost", category: "CMS", confidence: Confidence::High, check: Check::Generator(&RE_GHOST_GENERATOR), version: VersionHint::FromGenerator },
    Rule { name: "Joomla", category: "CMS", confidence: Confidence::High, check: Check::Generator(&RE_JOOMLA_GENERATOR), version: VersionHint::None },
    Rule { name: "Drupal", category: "CMS", confidence: Confidence::High, check: Check::Global("Drupal"), version: VersionHint::None },
    Rule { name: "Drupal", category: "CMS", confidence: Confidence::Medium, check: Check::Body(&RE_DRUPAL), version: VersionHint::None },
    Rule { name: "Google Analytics", category: "Analytics", confidence: Confidence::High, check: Check::ScriptSrc(&RE_GA), version: VersionHint::None },
    Rule { name: "Google Tag Manager", category: "Analytics", confidence: Confidence::High, check: Check::ScriptSrc(&RE_GTM), version: VersionHint::None },
    Rule { name: "Google Tag Manager", category: "Analytics", confidence: Confidence::Medium, check: Check::Global("dataLayer"), version: VersionHint::None },
    Rule { name: "Meta Pixel", category: "Analytics", confidence: Confidence::High, check: Check::Global("fbq"), version: VersionHint::None },
    Rule { name: "Meta Pixel", category: "Analytics", confidence: Confidence::High, check: Check::ScriptSrc(&RE_META_PIXEL), version: VersionHint::None },
    Rule { name: "Hotjar", category: "Analytics", confidence: Confidence::High, check: Check::Global("hj"), version: VersionHint::None },
    Rule { name: "Hotjar", category: "Analytics", confidence: Confidence::High, check: Check::ScriptSrc(&RE_HOTJAR), version: VersionHint::None },
    Rule { name: "Mixpanel", category: "Analytics", confidence: Confidence::High, check: Check::Global("mixpanel"), version: VersionHint::None },
    Rule { name: "Amplitude", category: "Analytics", confidence: Confidence::High, check: Check::Global("amplitude"), version: VersionHint::None },
    Rule { name: "Microsoft Clarity", category: "Analytics", confidence: Confidence::High, check: Check::Global("clarity"), version: VersionHint::None },
    Rule { name: "Microsoft Clarity", category: "Analytics", confidence: Confidence::High, check: Check::ScriptSrc(&RE_CLARITY), version: VersionHint::None },
    Rule { name: "Framer", category: "Website Builder", confidence: Confidence::High, check: Check::Body(&RE_FRAMER), version: VersionHint::None },
    Rule { name: "Framer Motion", category: "UI Library", confidence: Confidence::Medium, check: Check::Body(&RE_FRAMER_MOTION), version: VersionHint::None },
    Rule { name: "GSAP", category: "UI Library", confidence: Confidence::High, check: Check::Global("gsap"), version: VersionHint::None },
    Rule { name: "GSAP", category: "UI Library", confidence: Confidence::High, check: Check::ScriptSrc(&RE_GSAP_SRC), version: VersionHint::None },
    Rule { name: "Swiper", category: "UI Library", confidence: Confidence::High, check: Check::Global("Swiper"), version: VersionHint::None },
    Rule { name: "Swiper", category: "UI Library", confidence: Confidence::Medium, check: Check::Stylesheet(&RE_SWIPER_CSS), version: VersionHint::None },
    Rule { name: "Chart.js", category: "UI Library", confidence: Confidence::High, check: Check::Global("Chart"), version: VersionHint::None },
    Rule { name: "D3.js", category: "UI Library", confidence: Confidence::High, check: Check::Global("d3"), version: VersionHint::None },
    Rule { name: "Three.js", category: "UI Library", confidence: Confidence::High, check: Check::Global("THREE"), version: VersionHint::None },
    Rule { name: "Stripe", category: "Payments", confidence: Confidence::High, check: Check::Global("Stripe"), version: VersionHint::None },
    Rule { name: "Stripe", category: "Payments", confidence: Confidence::High, check: Check::ScriptSrc(&RE_STRIPE_JS), version: VersionHint::None },
    Rule { name: "Google Maps", category: "Maps", confidence: Confidence::High, check: Check::ScriptSrc(&RE_GOOGLE_MAPS), version: VersionHint::None },
    Rule { name: "reCAPTCHA", category: "Security", confidence: Confidence::High, check: Check::Global("grecaptcha"), version: VersionHint::None },
    Rule { name: "reCAPTCHA", category: "Security", confidence: Confidence::High, check: Check::ScriptSrc(&RE_RECAPTCHA), version: VersionHint::None },
    Rule { name: "Intercom", category: "Customer Support", confidence: Confidence::High, check: Check::Global("Intercom"), version: VersionHint::None },
    Rule { name: "Sentry", category: "Monitoring", confidence: Confidence::High, check: Check::Global("Sentry"), version: VersionHint::None },
    Rule { name: "Sentry", category: "Monitoring", confidence: Confidence::High, check: Check::ScriptSrc(&RE_SENTRY_CDN), version: VersionHint::None },
    Rule { name: "Axios", category: "JS Library", confidence: Confidence::High, check: Check::Global("axios"), version: VersionHint::None },
    Rule { name: "Lodash", category: "JS Library", confidence: Confidence::High, check: Check::ScriptSrc(&RE_LODASH), version: VersionHint::None },
    Rule { name: "Moment.js", category: "JS Library", confidence: Confidence::High, check: Check::Global("moment"), version: VersionHint::None },
    Rule { name: "Adobe Fonts", category: "Fonts", confidence: Confidence::High, check: Check::Stylesheet(&RE_TYPEKIT), version: VersionHint::None },
    Rule { name: "Google Fonts", category: "Fonts", confidence: Confidence::High, check: Check::Stylesheet(&RE_GOOGLE_FONTS), version: VersionHint::None },
    Rule { name: "jsDelivr", category: "CDN", confidence: Confidence::High, check: Check::ScriptSrc(&RE_JSDELIVR), version: VersionHint::None },
    Rule { name: "cdnjs", category: "CDN", confidence: Confidence::High, check: Check::ScriptSrc(&RE_CDNJS), version: VersionHint::None },
    Rule { name: "unpkg", category: "CDN", confidence: Confidence::High, check: Check::ScriptSrc(&RE_UNPKG), version: VersionHint::None },
];

fn version_for(signals: &TechSignals, hint: &VersionHint, generator_capture: Option<String>) -> Option<String> {
    match hint {
        VersionHint::None => None,
        VersionHint::Key(key) => signals.versions.get(*key).cloned(),
        VersionHint::NgVersion => signals.ng_version.clone(),
        VersionHint::FromGenerator => generator_capture,
    }
}

fn detect_page(signals: &TechSignals) -> Vec<Technology> {
    let mut detected: Vec<Technology> = Vec::new();
    for rule in RULES {
        if detected.iter().any(|t| t.name == rule.name) {
            continue;
        }
        let mut generator_capture = None;
        let matched = match &rule.check {
            Check::Global(name) => signals.globals.iter().any(|g| g == name),
            Check::ScriptSrc(re) => signals.script_srcs.iter().any(|s| re.is_match(s)),
            Check::Stylesheet(re) => signals.stylesheets.iter().any(|s| re.is_match(s)),
            Check::Body(re) => re.is_match(&signals.body),
            Check::Generator(re) => match signals.generator.as_deref() {
                Some(g) => match re.captures(g) {
                    Some(caps) => {
                        generator_capture = caps.get(1).map(|m| m.as_str().to_string());
                        true
                    }
                    None => false,
                },
                None => false,
            },
        };
        if matched {
            detected.push(Technology {
                name: rule.name.to_string(),
                category: rule.category.to_string(),
                version: version_for(signals, &rule.version, generator_capture),
                confidence: rule.confidence,
            });
        }
    }
    // Angular exposes no global in production builds; the ng-version
    // attribute on the root element is the reliable signal.
    if signals.ng_version.is_some() && !detected.iter().any(|t| t.name == "Angular") {
        detected.insert(
            0,
            Technology {
                name: "Angular".to_string(),
                category: "JS Framework".to_string(),
                version: signals.ng_version.clone(),
                confidence: Confidence::High,
            },
        );
    }
    detected
}

static RE_PHP_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)php/([\d.]+)").unwrap());
static RE_PHP_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\.php[\s'"?#]|phpmailer|PHPSESSID"#).unwrap());
static RE_SASS_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.scss|/sass/").unwrap());

/// Adds a language entry, upgrading confidence and filling the version when
/// the same language is inferred from more than one signal.
fn push_language(languages: &mut Vec<Technology>, tech: Technology) {
    if let Some(existing) = languages.iter_mut().find(|t| t.name == tech.name) {
        if confidence_rank(tech.confidence) > confidence_rank(existing.confidence) {
            existing.confidence = tech.confidence;
        }
        if existing.version.is_none() {
            existing.version = tech.version;
        }
    } else {
        languages.push(tech);
    }
}

fn confidence_rank(c: Confidence) -> u8 {
    match c {
        Confidence::High => 2,
        Confidence::Medium => 1,
        Confidence::Low => 0,
    }
}

fn language(name: &str, confidence: Confidence, version: Option<String>) -> Technology {
    Technology {
        name: name.to_string(),
        category: "Language".to_string(),
        version,
        confidence,
    }
}

/// Infers the languages behind the page from markup, sourcemaps, doctype,
/// server headers and the frameworks already detected.
fn detect_languages(
    signals: &TechSignals,
    server: &ServerInfo,
    page: &[Technology],
) -> Vec<Technology> {
    let mut languages = Vec::new();
    push_language(&mut languages, language("JavaScript", Confidence::High, None));
    push_language(&mut languages, language("CSS", Confidence::High, None));

    if signals.has_ts_sourcemaps {
        push_language(&mut languages, language("TypeScript", Confidence::High, None));
    } else if signals.has_module_scripts {
        push_language(&mut languages, language("TypeScript", Confidence::Medium, None));
    }
    if RE_SASS_HINT.is_match(&signals.body)
        || signals.stylesheets.iter().any(|s| RE_SASS_HINT.is_match(s))
    {
        push_language(&mut languages, language("Sass", Confidence::Medium, None));
    }
    if RE_PHP_MARKUP.is_match(&signals.body) {
        push_language(&mut languages, language("PHP", Confidence::Medium, None));
    }

    match signals.doctype.as_deref() {
        Some("html5") => push_language(&mut languages, language("HTML5", Confidence::High, None)),
        Some("xhtml") => push_language(&mut languages, language("XHTML", Confidence::High, None)),
        Some("html4") => push_language(&mut languages, language("HTML4", Confidence::High, None)),
        _ => {}
    }

    let server_line = format!(
        "{} {}",
        server.server.as_deref().unwrap_or(""),
        server.powered_by.as_deref().unwrap_or("")
    )
    .to_lowercase();
    if server_line.contains("php") {
        let version = RE_PHP_VERSION
            .captures(&server_line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        push_language(&mut languages, language("PHP", Confidence::High, version));
    }
    if server_line.contains("express") || server_line.contains("node") {
        push_language(&mut languages, language("Node.js", Confidence::High, None));
    }
    for marker in ["python", "django", "flask", "fastapi", "gunicorn", "uvicorn", "wsgi"] {
        if server_line.contains(marker) {
            push_language(&mut languages, language("Python", Confidence::High, None));
            break;
        }
    }
    for marker in ["ruby", "passenger", "webrick", "puma"] {
        if server_line.contains(marker) {
            push_language(&mut languages, language("Ruby", Confidence::High, None));
            break;
        }
    }
    for marker in ["tomcat", "jboss", "wildfly", "jsp"] {
        if server_line.contains(marker) {
            push_language(&mut languages, language("Java", Confidence::High, None));
            break;
        }
    }
    if server_line.contains("caddy") || server_line.contains("go ") {
        push_language(&mut languages, language("Go", Confidence::High, None));
    }
    if server_line.contains("iis") || server_line.contains("asp.net") {
        push_language(&mut languages, language("C# / ASP.NET", Confidence::High, None));
    }

    let has = |name: &str| page.iter().any(|t| t.name == name);
    if has("React") || has("Vue.js") || has("Next.js") || has("Nuxt.js") || has("Svelte") || has("Angular") {
        push_language(&mut languages, language("Node.js", Confidence::Medium, None));
    }
    if has("Next.js") || has("Angular") {
        push_language(&mut languages, language("TypeScript", Confidence::Medium, None));
    }
    if has("WordPress") || has("Joomla") || has("Drupal") {
        push_language(&mut languages, language("PHP", Confidence::High, None));
    }
    if has("Ghost") {
        push_language(&mut languages, language("Node.js", Confidence::High, None));
    }

    languages
}

/// Reads the Server and X-Powered-By response headers with a single HEAD
/// request. Failures degrade to an empty `ServerInfo`.
async fn probe_server(http: &reqwest::Client, target: &Url) -> ServerInfo {
    let response = match http
        .head(target.clone())
        .timeout(SERVER_PROBE_TIMEOUT)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Server header probe failed.");
            return ServerInfo::default();
        }
    };
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ServerInfo {
        server: header("server"),
        powered_by: header("x-powered-by"),
    }
}

/// Detects the frameworks, CMSes, third-party services and languages behind
/// the page from one DOM sweep plus the server response headers.
///
/// # Arguments
/// * `session` - The page session left on the target by navigation.
/// * `http` - Shared HTTP client for the server header probe.
/// * `target` - The validated scan target.
pub async fn run_tech_stack_detection(
    session: &PageSession,
    http: &reqwest::Client,
    target: &Url,
) -> Result<TechStackResults, ScanError> {
    debug!("Starting tech stack detection.");
    let server_info = probe_server(http, target).await;
    let signals: TechSignals = session.evaluate_as(SWEEP_SCRIPT).await?;

    let page = detect_page(&signals);
    let languages = detect_languages(&signals, &server_info, &page);

    let mut detected = page;
    for lang in languages {
        if !detected.iter().any(|t| t.name == lang.name) {
            detected.push(lang);
        }
    }

    let results = TechStackResults {
        total_detected: detected.len(),
        detected,
        server_info,
    };
    info!(
        total = results.total_detected,
        "Tech stack detection finished."
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> TechSignals {
        TechSignals {
            doctype: Some("html5".to_string()),
            ..TechSignals::default()
        }
    }

    #[test]
    fn react_global_wins_over_markup_and_carries_its_version() {
        let mut s = signals();
        s.globals.push("React".to_string());
        s.versions.insert("react".to_string(), "18.3.1".to_string());
        s.body = "<div data-reactroot></div>".to_string();
        let page = detect_page(&s);
        let react: Vec<_> = page.iter().filter(|t| t.name == "React").collect();
        assert_eq!(react.len(), 1);
        assert_eq!(react[0].version.as_deref(), Some("18.3.1"));
        assert_eq!(react[0].confidence, Confidence::High);
    }

    #[test]
    fn wordpress_generator_yields_cms_and_php() {
        let mut s = signals();
        s.generator = Some("WordPress 6.5.2".to_string());
        let page = detect_page(&s);
        let wp = page.iter().find(|t| t.name == "WordPress").unwrap();
        assert_eq!(wp.category, "CMS");
        assert_eq!(wp.version.as_deref(), Some("6.5.2"));

        let langs = detect_languages(&s, &ServerInfo::default(), &page);
        let php = langs.iter().find(|t| t.name == "PHP").unwrap();
        assert_eq!(php.confidence, Confidence::High);
    }

    #[test]
    fn angular_is_detected_from_the_ng_version_attribute() {
        let mut s = signals();
        s.ng_version = Some("17.1.0".to_string());
        s.body = r#"<app-root ng-version="17.1.0"></app-root>"#.to_string();
        let page = detect_page(&s);
        let ng = page.iter().find(|t| t.name == "Angular").unwrap();
        assert_eq!(ng.version.as_deref(), Some("17.1.0"));

        let langs = detect_languages(&s, &ServerInfo::default(), &page);
        assert!(langs.iter().any(|t| t.name == "TypeScript"));
        assert!(langs.iter().any(|t| t.name == "Node.js"));
    }

    #[test]
    fn server_headers_drive_backend_language_inference() {
        let server = ServerInfo {
            server: Some("nginx/1.24".to_string()),
            powered_by: Some("PHP/8.2.7".to_string()),
        };
        let langs = detect_languages(&signals(), &server, &[]);
        let php = langs.iter().find(|t| t.name == "PHP").unwrap();
        assert_eq!(php.confidence, Confidence::High);
        assert_eq!(php.version.as_deref(), Some("8.2.7"));
    }

    #[test]
    fn typescript_confidence_follows_sourcemap_evidence() {
        let mut s = signals();
        s.has_module_scripts = true;
        let langs = detect_languages(&s, &ServerInfo::default(), &[]);
        let ts = langs.iter().find(|t| t.name == "TypeScript").unwrap();
        assert_eq!(ts.confidence, Confidence::Medium);

        s.has_ts_sourcemaps = true;
        let langs = detect_languages(&s, &ServerInfo::default(), &[]);
        let ts = langs.iter().find(|t| t.name == "TypeScript").unwrap();
        assert_eq!(ts.confidence, Confidence::High);
    }

    #[test]
    fn baseline_languages_are_always_present() {
        let langs = detect_languages(&signals(), &ServerInfo::default(), &[]);
        assert!(langs.iter().any(|t| t.name == "JavaScript"));
        assert!(langs.iter().any(|t| t.name == "CSS"));
        assert!(langs.iter().any(|t| t.name == "HTML5"));
    }

    #[test]
    fn third_party_services_match_on_script_sources() {
        let mut s = signals();
        s.script_srcs = vec![
            "https://www.googletagmanager.com/gtag/js?id=G-1".to_string(),
            "https://js.stripe.com/v3/".to_string(),
            "https://cdn.jsdelivr.net/npm/lodash@4/lodash.min.js".to_string(),
        ];
        let page = detect_page(&s);
        let names: Vec<_> = page.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Google Analytics"));
        assert!(names.contains(&"Stripe"));
        assert!(names.contains(&"jsDelivr"));
        assert!(names.contains(&"Lodash"));
    }

    #[test]
    fn duplicate_names_never_appear_twice() {
        let mut s = signals();
        s.globals = vec!["fbq".to_string()];
        s.script_srcs = vec!["https://connect.facebook.net/en_US/fbevents.js".to_string()];
        let page = detect_page(&s);
        let pixels = page.iter().filter(|t| t.name == "Meta Pixel").count();
        assert_eq!(pixels, 1);
    }
}
