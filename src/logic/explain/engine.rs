use super::types::{Explanation, Factor};
use crate::logic::features::{feature_name, FeatureVector, FEATURE_COUNT};

// Severity of each feature when it signals risk
// 1.0 = standard, 1.5 = strong phishing tell
static FEATURE_SEVERITY: [f32; FEATURE_COUNT] = [
    1.3, // form_handler (credential harvesting)
    1.0, // popup
    1.2, // transport_security
    1.0, // external_resource_ratio
    1.1, // external_link_ratio
    0.0, // traffic_placeholder (never explained)
    1.0, // url_length_bucket
    1.2, // domain_age_bucket
    1.5, // ip_literal_flag
];

enum Reading {
    Risk(&'static str),
    Safe(&'static str),
    Silent,
}

/// Risk and safety factors for `v`
pub fn explain(v: &FeatureVector) -> Explanation {
    let mut explanation = Explanation::default();

    for (i, &value) in v.as_array().iter().enumerate() {
        let name = feature_name(i).unwrap_or("unknown");
        let (list, message) = match read(name, value) {
            Reading::Risk(m) => (&mut explanation.risks, m),
            Reading::Safe(m) => (&mut explanation.safeguards, m),
            Reading::Silent => continue,
        };
        list.push(Factor {
            feature: name.to_string(),
            value,
            severity: FEATURE_SEVERITY[i],
            message: message.to_string(),
        });
    }

    explanation
        .risks
        .sort_by(|a, b| b.severity.partial_cmp(&a.severity).unwrap_or(std::cmp::Ordering::Equal));

    explanation
}

fn read(name: &str, value: i8) -> Reading {
    match (name, value) {
        ("form_handler", 1) => Reading::Risk("Suspicious form: sends data to an external or empty target"),
        ("form_handler", -1) => Reading::Safe("Secure forms: data is processed by the site itself"),

        ("popup", 1) => Reading::Risk("Intrusive behavior: attempts to open pop-up windows"),

        ("transport_security", 1) => Reading::Risk("Insecure connection: no valid HTTPS"),
        ("transport_security", _) => Reading::Safe("Encrypted connection via HTTPS"),

        ("external_resource_ratio", 1) => Reading::Risk("Most images and resources load from other domains"),

        ("external_link_ratio", 1) => Reading::Risk("Anomalous link structure: most links lead to other sites"),
        ("external_link_ratio", _) => Reading::Safe("Consistent navigation: links stay on the domain"),

        ("url_length_bucket", 1) => Reading::Risk("URL too long, a common way to hide the real domain"),
        ("url_length_bucket", -1) => Reading::Safe("Concise URL of standard length"),

        ("domain_age_bucket", 1) => Reading::Risk("Domain younger than six months or age unknown"),
        ("domain_age_bucket", _) => Reading::Safe("Established domain, older than six months"),

        ("ip_literal_flag", 1) => Reading::Risk("Raw IP address instead of a registered domain"),

        _ => Reading::Silent,
    }
}
