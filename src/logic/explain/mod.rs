//! Explain Module - Why a Site Looks Risky or Safe
//!
//! Maps each feature value to a short message. Used by the CLI to show the
//! reasons behind a verdict; never influences the verdict itself.

pub mod engine;
pub mod types;

pub use engine::explain;
pub use types::{Explanation, Factor};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureVector;

    #[test]
    fn test_suspicious_default_is_all_risk() {
        let explanation = explain(&FeatureVector::suspicious_default());
        assert_eq!(explanation.risks.len(), 8);
        assert!(explanation.safeguards.is_empty());
        // Raw IP is the strongest tell
        assert_eq!(explanation.risks[0].feature, "ip_literal_flag");
    }

    #[test]
    fn test_clean_site_is_all_safeguards() {
        let v = FeatureVector::new([-1, -1, -1, -1, -1, 1, -1, -1, 0]).unwrap();
        let explanation = explain(&v);
        assert!(explanation.risks.is_empty());
        let messages: Vec<_> = explanation.safeguard_messages().collect();
        assert_eq!(messages.len(), 5);
        assert!(messages.iter().any(|m| m.contains("HTTPS")));
    }

    #[test]
    fn test_neutral_values_are_silent() {
        let v = FeatureVector::new([0, -1, -1, 0, -1, 0, 0, -1, 0]).unwrap();
        let explanation = explain(&v);
        assert!(explanation.risks.is_empty());
        assert!(!explanation.safeguards.iter().any(|f| f.feature == "form_handler"));
        assert!(!explanation.safeguards.iter().any(|f| f.feature == "url_length_bucket"));
    }
}
