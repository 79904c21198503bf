// src/core/guard.rs

use crate::core::error::ScanError;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::{Host, Url};

/// Maximum accepted length of the raw URL string, in characters, before
/// normalization.
pub const MAX_URL_LEN: usize = 2048;
/// Fixed rate-limit window.
pub const RATE_LIMIT_WINDOW_MS: u64 = 60_000;
/// Maximum requests per client identifier per window.
pub const RATE_LIMIT_MAX: u32 = 5;

// --- Client identity ---

/// Derives the rate-limit bucket for a request: first entry of the
/// forwarded-for header, else the direct-connection header, else a shared
/// "unknown" bucket. All unidentified clients sharing one quota is a
/// deliberate simplification for deployment behind a trusted proxy.
pub fn client_id(forwarded_for: Option<&str>, real_ip: Option<&str>) -> String {
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(ip) = real_ip {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }
    "unknown".to_string()
}

// --- Rate limiter ---

/// Injectable time source so tests can drive the window deterministically.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_reset_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the window resets; only meaningful when rejected.
    pub retry_after: u64,
}

/// Fixed-window in-memory rate limiter, keyed by client identifier.
///
/// Entries are replaced lazily when their window has expired and are never
/// proactively swept, so the map grows with the number of distinct clients
/// over the process lifetime. Known limitation, kept on purpose.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and records one request for `client`.
    pub fn check(&self, client: &str) -> RateDecision {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().expect("rate limiter lock poisoned");
        match entries.get_mut(client) {
            Some(entry) if now <= entry.window_reset_at_ms => {
                if entry.count >= RATE_LIMIT_MAX {
                    let retry_after = (entry.window_reset_at_ms - now).div_ceil(1000);
                    debug!(client, retry_after, "Rate limit exceeded.");
                    return RateDecision {
                        allowed: false,
                        retry_after,
                    };
                }
                entry.count += 1;
                RateDecision {
                    allowed: true,
                    retry_after: 0,
                }
            }
            _ => {
                entries.insert(
                    client.to_string(),
                    RateLimitEntry {
                        count: 1,
                        window_reset_at_ms: now + RATE_LIMIT_WINDOW_MS,
                    },
                );
                RateDecision {
                    allowed: true,
                    retry_after: 0,
                }
            }
        }
    }
}

// --- Body validation ---

#[derive(Debug, Deserialize)]
struct ScanRequestBody {
    url: Option<serde_json::Value>,
}

/// Validates the raw request body and extracts the target string.
///
/// A body that does not parse, a missing `url` field, and a non-string
/// `url` all produce the same class of rejection; oversized and empty
/// values get their own messages.
pub fn validate_body(raw: &str) -> Result<String, ScanError> {
    let body: ScanRequestBody = serde_json::from_str(raw)
        .map_err(|_| ScanError::InvalidRequest("Invalid request body".into()))?;
    let url = match body.url {
        Some(serde_json::Value::String(s)) => s,
        _ => return Err(ScanError::InvalidRequest("URL is required".into())),
    };
    if url.chars().count() > MAX_URL_LEN {
        return Err(ScanError::InvalidRequest(
            "URL too long (max 2048 characters)".into(),
        ));
    }
    if url.trim().is_empty() {
        return Err(ScanError::InvalidRequest("URL is required".into()));
    }
    Ok(url)
}

// --- URL normalization + SSRF guard ---

/// Normalizes the user-supplied target and rejects anything that could
/// reach internal infrastructure. This runs before any network or browser
/// action touches the target; it is the sole SSRF protection.
pub fn normalize_target(raw: &str) -> Result<Url, ScanError> {
    let trimmed = raw.trim();
    let with_scheme = if has_scheme_token(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|_| ScanError::InvalidRequest("Invalid URL format".into()))?;

    ensure_safe(&parsed)?;
    Ok(parsed)
}

/// A leading scheme token looks like `alpha (alnum|+|-|.)* :` followed by
/// something that is not a port number, so "example.com:8080/x" still gets
/// the https prefix while "ftp://host" keeps its scheme and is rejected by
/// the protocol whitelist.
fn has_scheme_token(input: &str) -> bool {
    let Some(colon) = input.find(':') else {
        return false;
    };
    let candidate = &input[..colon];
    let mut chars = candidate.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return false;
    }
    !input[colon + 1..].starts_with(|c: char| c.is_ascii_digit())
}

fn ensure_safe(url: &Url) -> Result<(), ScanError> {
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        warn!(%url, scheme, "Rejected target with disallowed protocol.");
        return Err(ScanError::InvalidRequest(format!(
            "Protocol \"{scheme}:\" is not allowed"
        )));
    }

    match url.host() {
        Some(Host::Domain(domain)) => {
            let lower = domain.to_ascii_lowercase();
            if is_blocked_hostname(&lower) {
                warn!(host = %lower, "Rejected internal hostname.");
                return Err(ScanError::InvalidRequest(
                    "Scanning internal hostnames is not allowed".into(),
                ));
            }
            // Some IPv4 literals parse as domains depending on notation.
            if let Ok(ip) = lower.parse::<Ipv4Addr>() {
                if is_private_ipv4(ip) {
                    warn!(host = %lower, "Rejected private IPv4 literal.");
                    return Err(private_ip_error());
                }
            }
        }
        Some(Host::Ipv4(ip)) => {
            if is_private_ipv4(ip) {
                warn!(host = %ip, "Rejected private IPv4 address.");
                return Err(private_ip_error());
            }
        }
        Some(Host::Ipv6(ip)) => {
            if is_private_ipv6(ip) {
                warn!(host = %ip, "Rejected private IPv6 address.");
                return Err(private_ip_error());
            }
        }
        None => {
            return Err(ScanError::InvalidRequest("Invalid URL format".into()));
        }
    }
    Ok(())
}

fn private_ip_error() -> ScanError {
    ScanError::InvalidRequest("Scanning private/internal IP addresses is not allowed".into())
}

fn is_blocked_hostname(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".local")
        || host.ends_with(".internal")
        || host.ends_with(".corp")
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    a == 127
        || a == 10
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
        || (a == 169 && b == 254)
}

fn is_private_ipv6(ip: Ipv6Addr) -> bool {
    // IPv4-mapped addresses inherit the IPv4 verdict, so ::ffff:127.0.0.1
    // cannot slip past the v4 blocklist.
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_private_ipv4(mapped);
    }
    // Loopback and the fc00::/7 unique-local block.
    ip.is_loopback() || (ip.segments()[0] & 0xfe00) == 0xfc00
}
