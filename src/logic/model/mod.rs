//! Model Module - Classifiers and Anomaly Detection
//!
//! - `sgd` - online logistic classifier used by the agent
//! - `isolation_forest` - batch anomaly detector used as fallback
//! - `artifact` - versioned, checksummed persistence of the batch model
//! - `evaluate` - accuracy and per-class report for the promotion gate
//!
//! The batch model is consumed through `AnomalyDetector` only, so the
//! router and maintenance pipeline never depend on the forest itself.

pub mod sgd;
pub mod isolation_forest;
pub mod artifact;
pub mod evaluate;

use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureVector;
use crate::logic::labels::Verdict;

// Re-export common types
pub use sgd::OnlineClassifier;
pub use isolation_forest::{ForestConfig, IsolationForest};
pub use artifact::{ArtifactError, ArtifactStore, BatchModelArtifact};
pub use evaluate::{accuracy, EvaluationReport};

// ============================================================================
// ANOMALY DETECTOR TRAIT
// ============================================================================

/// Output of the batch model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyVerdict {
    Legitimate,
    Anomaly,
}

impl AnomalyVerdict {
    /// +1 for legitimate, -1 for anomaly
    pub fn as_i8(self) -> i8 {
        match self {
            AnomalyVerdict::Legitimate => 1,
            AnomalyVerdict::Anomaly => -1,
        }
    }
}

impl From<AnomalyVerdict> for Verdict {
    fn from(v: AnomalyVerdict) -> Self {
        match v {
            AnomalyVerdict::Legitimate => Verdict::Benign,
            AnomalyVerdict::Anomaly => Verdict::Threat,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// Replaceable unsupervised scorer with fit/predict semantics
///
/// Implementations must be deterministic for identical training input and
/// hyperparameters.
pub trait AnomalyDetector: Send + Sync {
    /// Train from scratch on vectors believed to be legitimate
    fn fit(&mut self, training: &[FeatureVector]) -> Result<(), FitError>;

    /// Anomaly score; higher means more anomalous
    fn score(&self, features: &FeatureVector) -> f64;

    fn predict(&self, features: &FeatureVector) -> AnomalyVerdict;
}
