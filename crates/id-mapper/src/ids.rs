//! Identifier normalization.
//!
//! Scrapers report external identifiers as bare ids, JSON numbers or full
//! URLs. Everything entering the graph goes through [`normalize_id`] so that
//! the same title is always the same `(service, id)` vertex.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use shared::{IdFormat, IdNode, Service};

/// Per-service patterns that pull an identifier out of a URL, tried in order
static URL_PATTERNS: Lazy<Vec<(Service, Regex)>> = Lazy::new(|| {
    [
        (Service::AniDb, r"aid=(\d+)"),
        (Service::AniDb, r"/anime/(\d+)"),
        (Service::AniList, r"/(?:anime|manga)/(\d+)"),
        (Service::Mal, r"/(?:anime|manga)/(\d+)"),
        (Service::Kitsu, r"/(?:anime|manga)/(\d+)"),
        (Service::Kitsu, r"/(?:anime|manga)/([^/?#]+)"),
        (Service::Simkl, r"/(?:anime|movies|tv)/(\d+)"),
        (Service::Tmdb, r"/(?:tv|movie)/(\d+)"),
        (Service::Tvdb, r"/series/(\d+)"),
        (Service::Tvdb, r"id=(\d+)"),
        (Service::Imdb, r"(tt\d+)"),
        (Service::Ann, r"id=(\d+)"),
        (Service::Livechart, r"/anime/(\d+)"),
    ]
    .into_iter()
    .map(|(service, pattern)| (service, Regex::new(pattern).unwrap()))
    .collect()
});

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)tt\d+").unwrap());

/// Convert a raw JSON id value into a string
///
/// Strings are taken as-is, integral numbers (including `12.0`) are rendered
/// in decimal. Anything else carries no identifier.
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| format!("{:.0}", f))
            }
        }
        _ => None,
    }
}

/// Normalize a raw identifier for `service`
///
/// Returns `None` for empty values and for URLs no identifier can be
/// extracted from.
pub fn normalize_id(service: Service, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let candidate = if looks_like_url(raw) {
        extract_from_url(service, raw)?
    } else {
        raw.to_string()
    };

    let normalized = canonicalize(service.id_format(), &candidate);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Normalize a raw JSON id value for `service`
pub fn normalize_value(service: Service, value: &Value) -> Option<String> {
    value_to_id(value).and_then(|raw| normalize_id(service, &raw))
}

/// Parse a `service:id` reference and normalize its id
pub fn parse_node(reference: &str) -> anyhow::Result<IdNode> {
    let (service, id) = reference
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Expected service:id, got {}", reference))?;
    let service: Service = service.parse()?;
    let id = normalize_id(service, id)
        .ok_or_else(|| anyhow::anyhow!("Empty identifier in {}", reference))?;
    Ok(IdNode::new(service, id))
}

fn looks_like_url(raw: &str) -> bool {
    raw.contains("://") || raw.starts_with("www.")
}

/// Extract an identifier from a service URL
pub fn extract_from_url(service: Service, url: &str) -> Option<String> {
    if service == Service::AnimePlanet {
        return last_path_segment(url);
    }

    URL_PATTERNS
        .iter()
        .filter(|(s, _)| *s == service)
        .find_map(|(_, pattern)| pattern.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn last_path_segment(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segments: Vec<&str> = path
        .split('/')
        .skip(1)
        .filter(|s| !s.is_empty())
        .collect();

    if segments.len() >= 2 {
        segments.last().map(|s| s.to_string())
    } else {
        None
    }
}

fn canonicalize(format: IdFormat, id: &str) -> String {
    match format {
        IdFormat::Numeric => canonical_number(id).unwrap_or_else(|| id.to_string()),
        IdFormat::NumericOrSlug => canonical_number(id).unwrap_or_else(|| slugify(id)),
        IdFormat::Slug => slugify(id),
        IdFormat::Imdb => IMDB_ID
            .find(id)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| id.to_lowercase()),
    }
}

/// Decimal form without leading zeros, if `id` is all digits
fn canonical_number(id: &str) -> Option<String> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = id.trim_start_matches('0');
    Some(if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Lowercase hyphenated slug
fn slugify(id: &str) -> String {
    let mut slug = String::with_capacity(id.len());
    let mut pending_hyphen = false;

    for c in id.trim().chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_hyphen = !slug.is_empty();
        } else {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.extend(c.to_lowercase());
        }
    }

    slug
}
