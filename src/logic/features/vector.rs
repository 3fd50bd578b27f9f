//! Feature Vector - Core data structure for ML input
//!
//! A fixed 9-value signed descriptor of a URL/page. Every value is one of
//! -1 (legitimate-leaning), 0 (neutral) or 1 (risk-leaning).
//!
//! Construction always validates shape and range, so any `FeatureVector`
//! in the engine is known to conform to the layout in `layout.rs`.

use serde::{Deserialize, Serialize};
use super::layout::{FEATURE_COUNT, FEATURE_LAYOUT};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
    #[error("expected 9 features, got {0}")]
    WrongLength(usize),

    #[error("feature '{name}' has value {value}, expected -1, 0 or 1")]
    OutOfRange { name: &'static str, value: i64 },
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Immutable, validated feature vector
///
/// Equality and hashing are by exact value, which is what the replay memory
/// keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct FeatureVector {
    values: [i8; FEATURE_COUNT],
}

impl FeatureVector {
    /// Risk-leaning vector returned when a page cannot be inspected
    pub const SUSPICIOUS_DEFAULT: [i8; FEATURE_COUNT] = [1, 1, 1, 1, 1, -1, 1, 1, 1];

    /// Create from raw values, validating the range of each one
    pub fn new(values: [i8; FEATURE_COUNT]) -> Result<Self, FeatureError> {
        for (i, &v) in values.iter().enumerate() {
            if !(-1..=1).contains(&v) {
                return Err(FeatureError::OutOfRange {
                    name: FEATURE_LAYOUT[i],
                    value: v as i64,
                });
            }
        }
        Ok(Self { values })
    }

    /// Create from a slice of any integer width (dataset rows, JSON)
    pub fn from_slice(values: &[i64]) -> Result<Self, FeatureError> {
        if values.len() != FEATURE_COUNT {
            return Err(FeatureError::WrongLength(values.len()));
        }

        let mut array = [0i8; FEATURE_COUNT];
        for (i, &v) in values.iter().enumerate() {
            if !(-1..=1).contains(&v) {
                return Err(FeatureError::OutOfRange { name: FEATURE_LAYOUT[i], value: v });
            }
            array[i] = v as i8;
        }
        Ok(Self { values: array })
    }

    /// The canonical "could not inspect" vector
    pub fn suspicious_default() -> Self {
        Self { values: Self::SUSPICIOUS_DEFAULT }
    }

    pub fn as_array(&self) -> &[i8; FEATURE_COUNT] {
        &self.values
    }

    /// Values widened to f64 for the models
    pub fn to_f64(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (o, &v) in out.iter_mut().zip(self.values.iter()) {
            *o = v as f64;
        }
        out
    }

    /// Get feature by index
    pub fn get(&self, index: usize) -> Option<i8> {
        self.values.get(index).copied()
    }

    /// Get feature by name
    pub fn get_by_name(&self, name: &str) -> Option<i8> {
        super::layout::feature_index(name).and_then(|i| self.get(i))
    }

    /// Convert to JSON-serializable format for logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "values": self.values,
            "named_values": FEATURE_LAYOUT.iter()
                .zip(self.values.iter())
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<std::collections::BTreeMap<_, _>>(),
        })
    }
}

impl TryFrom<Vec<i64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl From<FeatureVector> for Vec<i64> {
    fn from(v: FeatureVector) -> Self {
        v.values.iter().map(|&x| x as i64).collect()
    }
}

impl std::fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// FEATURE EXTRACTOR TRAIT
// ============================================================================

/// Why a URL could not be turned into a feature vector
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("fetch failed for '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Maps a URL to a feature vector
///
/// `extract` never fails: anything that goes wrong yields the suspicious
/// default, so classification always receives a valid vector. Callers that
/// need to tell failures apart (maintenance reporting) use `try_extract`.
pub trait FeatureExtractor: Send + Sync {
    fn try_extract(&self, url: &str) -> Result<FeatureVector, ExtractError>;

    fn extract(&self, url: &str) -> FeatureVector {
        match self.try_extract(url) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Feature extraction failed ({}), using suspicious default", e);
                FeatureVector::suspicious_default()
            }
        }
    }

    /// `extract` plus the URL actually reached, when the extractor follows redirects
    fn extract_resolved(&self, url: &str) -> (FeatureVector, Option<String>) {
        (self.extract(url), None)
    }
}
