//! Page Feature Derivation
//!
//! Turns a fetched page (final URL + HTML body) into a `FeatureVector`.
//! Pure function of its inputs, so it is testable without the network.
//!
//! Free-hosting platforms get stricter treatment: their subdomains are
//! cheap to create, so forms, links and WHOIS age on them are not trusted.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::layout::FEATURE_COUNT;
use super::vector::{FeatureError, FeatureVector};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Platforms where anyone can publish a subdomain in minutes
pub const FREE_HOSTS: &[&str] = &[
    "onrender.com",
    "herokuapp.com",
    "vercel.app",
    "netlify.app",
    "glitch.me",
    "firebaseapp.com",
    "000webhostapp.com",
    "github.io",
    "repl.co",
    "fly.dev",
    "railway.app",
    "pages.dev",
];

const EXTERNAL_RESOURCE_LIMIT: f64 = 0.61;
const EXTERNAL_LINK_LIMIT: f64 = 0.67;
const SHORT_URL_MAX: usize = 54;
const LONG_URL_MIN: usize = 75;
const ESTABLISHED_DOMAIN_DAYS: i64 = 180;

static IP_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+\.\d+\.\d+\.\d+").expect("static regex")
});

static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form[action]").expect("static selector"));
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("static selector"));
static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

// ============================================================================
// DOMAIN AGE
// ============================================================================

/// Source of registration age for a domain (WHOIS or similar)
pub trait DomainAgeLookup: Send + Sync {
    /// Age in days, `None` when unknown or hidden
    fn age_days(&self, domain: &str) -> Option<i64>;
}

/// No WHOIS backend: every domain is of unknown age
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownDomainAge;

impl DomainAgeLookup for UnknownDomainAge {
    fn age_days(&self, _domain: &str) -> Option<i64> {
        None
    }
}

// ============================================================================
// PAGE SNAPSHOT
// ============================================================================

/// What the fetcher saw after following redirects
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub final_url: String,
    pub domain: String,
    pub body: String,
}

impl PageSnapshot {
    pub fn new(final_url: impl Into<String>, body: impl Into<String>) -> Self {
        let final_url = final_url.into();
        let domain = url::Url::parse(&final_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_default();
        Self { final_url, domain, body: body.into() }
    }

    pub fn is_free_hosting(&self) -> bool {
        is_free_hosting(&self.domain)
    }
}

pub fn is_free_hosting(domain: &str) -> bool {
    FREE_HOSTS.iter().any(|host| domain.ends_with(host))
}

// ============================================================================
// DERIVATION
// ============================================================================

/// Derive the 9 features of a page
pub fn derive_features(page: &PageSnapshot, ages: &dyn DomainAgeLookup) -> Result<FeatureVector, FeatureError> {
    let document = Html::parse_document(&page.body);
    let domain = page.domain.as_str();
    let free = page.is_free_hosting();

    let mut values = [0i8; FEATURE_COUNT];

    values[0] = if free { 1 } else { form_handler(&document, domain) };
    values[1] = if page.body.contains("window.open") { 1 } else { -1 };
    values[2] = if page.final_url.starts_with("https") { -1 } else { 1 };

    let resource_ratio = external_ratio(
        document.select(&IMG_SELECTOR).filter_map(|e| e.value().attr("src")),
        domain,
        false,
    );
    values[3] = if resource_ratio > EXTERNAL_RESOURCE_LIMIT { 1 } else { -1 };

    let link_ratio = external_ratio(
        document.select(&ANCHOR_SELECTOR).filter_map(|e| e.value().attr("href")),
        domain,
        true,
    );
    values[4] = if free || link_ratio > EXTERNAL_LINK_LIMIT { 1 } else { -1 };

    // No traffic-rank source; fixed
    values[5] = 1;
    values[6] = url_length_bucket(&page.final_url);
    values[7] = if free { 1 } else { domain_age_bucket(ages.age_days(domain)) };
    values[8] = if IP_LITERAL.is_match(domain) { 1 } else { 0 };

    FeatureVector::new(values)
}

fn form_handler(document: &Html, domain: &str) -> i8 {
    let mut result = -1;
    for form in document.select(&FORM_SELECTOR) {
        let action = form.value().attr("action").unwrap_or_default();
        if action.is_empty() || action == "about:blank" {
            return 1;
        }
        if !action.contains(domain) && !action.starts_with('/') {
            result = 0;
        }
    }
    result
}

fn external_ratio<'a>(targets: impl Iterator<Item = &'a str>, domain: &str, skip_fragments: bool) -> f64 {
    let mut total = 0usize;
    let mut external = 0usize;
    for target in targets {
        total += 1;
        let local = target.contains(domain)
            || target.starts_with('/')
            || (skip_fragments && target.starts_with('#'));
        if !local {
            external += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        external as f64 / total as f64
    }
}

pub fn url_length_bucket(url: &str) -> i8 {
    let len = url.len();
    if len < SHORT_URL_MAX {
        -1
    } else if len > LONG_URL_MIN {
        1
    } else {
        0
    }
}

pub fn domain_age_bucket(age_days: Option<i64>) -> i8 {
    match age_days {
        Some(days) if days >= ESTABLISHED_DOMAIN_DAYS => -1,
        _ => 1,
    }
}
