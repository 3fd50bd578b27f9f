//! HTTP Feature Extractor
//!
//! Fetches a live page (blocking, short timeout, redirects followed) and
//! hands it to `page::derive_features`.

use std::sync::Arc;
use std::time::Duration;

use super::page::{derive_features, DomainAgeLookup, PageSnapshot, UnknownDomainAge};
use super::vector::{ExtractError, FeatureExtractor, FeatureVector};
use crate::constants::DEFAULT_FETCH_TIMEOUT_SECS;

const MAX_REDIRECTS: u32 = 10;

pub struct HttpFeatureExtractor {
    agent: ureq::Agent,
    ages: Arc<dyn DomainAgeLookup>,
}

impl HttpFeatureExtractor {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(MAX_REDIRECTS)
            .build();
        Self { agent, ages: Arc::new(UnknownDomainAge) }
    }

    /// Plug in a WHOIS-backed age source
    pub fn with_domain_ages(mut self, ages: Arc<dyn DomainAgeLookup>) -> Self {
        self.ages = ages;
        self
    }

    /// Extract features together with the URL reached after redirects
    pub fn extract_with_final_url(&self, url: &str) -> Result<(FeatureVector, String), ExtractError> {
        let page = self.fetch(url)?;
        let features = derive_features(&page, self.ages.as_ref())?;
        Ok((features, page.final_url))
    }

    fn fetch(&self, url: &str) -> Result<PageSnapshot, ExtractError> {
        let url = normalize_url(url)?;

        let response = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            // Error pages are still pages
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(e) => {
                return Err(ExtractError::Fetch { url, reason: e.to_string() });
            }
        };

        let final_url = response.get_url().to_string();
        let body = response
            .into_string()
            .map_err(|e| ExtractError::Fetch { url: url.clone(), reason: e.to_string() })?;

        Ok(PageSnapshot::new(final_url, body))
    }
}

impl Default for HttpFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor for HttpFeatureExtractor {
    fn try_extract(&self, url: &str) -> Result<FeatureVector, ExtractError> {
        self.extract_with_final_url(url).map(|(features, _)| features)
    }

    fn extract_resolved(&self, url: &str) -> (FeatureVector, Option<String>) {
        match self.extract_with_final_url(url) {
            Ok((features, final_url)) => (features, Some(final_url)),
            Err(e) => {
                log::warn!("Feature extraction failed ({}), using suspicious default", e);
                (FeatureVector::suspicious_default(), None)
            }
        }
    }
}

/// Prefix scheme-less input with `http://` and check it parses
pub fn normalize_url(url: &str) -> Result<String, ExtractError> {
    let trimmed = url.trim();
    let candidate = if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    match url::Url::parse(&candidate) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(candidate),
        _ => Err(ExtractError::InvalidUrl(url.to_string())),
    }
}
