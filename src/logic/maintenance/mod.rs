//! Maintenance Module - Retrain, Evaluate, Promote
//!
//! Rebuilds the batch anomaly model from the reference dataset plus the
//! URLs users gave feedback on, and deploys it only if it does not regress
//! on the evaluation set by more than the configured tolerance.
//!
//! ## Flow
//! `Idle → Loading → Retraining → Evaluating → Promoted | Rejected → Idle`
//!
//! A rejected run leaves the deployed artifact and the feedback log exactly
//! as they were. A promoted run replaces the artifact and then empties the
//! log; if emptying fails the old artifact is put back.

pub mod state;
pub mod pipeline;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::logic::dataset::DatasetError;
use crate::logic::feedback::FeedbackError;
use crate::logic::model::{ArtifactError, EvaluationReport, FitError};

pub use pipeline::{MaintenancePipeline, ModelFactory};
pub use state::{MaintenanceState, StateMachine};

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("invalid maintenance transition: {from} -> {to}")]
    InvalidTransition { from: MaintenanceState, to: MaintenanceState },

    #[error("maintenance already running")]
    AlreadyRunning,

    #[error("dataset unavailable: {0}")]
    Dataset(#[from] DatasetError),

    #[error("deployed model unusable: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("feedback log unavailable: {0}")]
    Feedback(#[from] FeedbackError),

    #[error("feedback log is empty")]
    NoFeedback,

    #[error("training failed: {0}")]
    Fit(#[from] FitError),

    #[error("accuracy regressed: {new:.4} < {baseline:.4} - {tolerance}")]
    Regression { baseline: f64, new: f64, tolerance: f64 },

    #[error("promotion rolled back: {0}")]
    RolledBack(String),
}

/// Deploy iff the new model is no worse than baseline minus tolerance
pub fn passes_gate(new_accuracy: f64, baseline_accuracy: f64, tolerance: f64) -> bool {
    new_accuracy >= baseline_accuracy - tolerance
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum MaintenanceOutcome {
    Promoted { version: Uuid },
    Rejected { reason: String },
}

/// Ephemeral record of one run; never persisted
#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 0.0 when no model was deployed
    pub baseline_accuracy: f64,
    pub new_accuracy: Option<f64>,
    pub records_read: usize,
    pub extracted: usize,
    /// Unreachable URLs that contributed the suspicious default
    pub defaulted: usize,
    pub final_state: MaintenanceState,
    pub outcome: MaintenanceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_report: Option<EvaluationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_report: Option<EvaluationReport>,
}

impl MaintenanceReport {
    fn started() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            baseline_accuracy: 0.0,
            new_accuracy: None,
            records_read: 0,
            extracted: 0,
            defaulted: 0,
            final_state: MaintenanceState::Idle,
            outcome: MaintenanceOutcome::Rejected { reason: "not run".into() },
            baseline_report: None,
            new_report: None,
        }
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self.outcome, MaintenanceOutcome::Promoted { .. })
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match &self.outcome {
            MaintenanceOutcome::Rejected { reason } => Some(reason),
            MaintenanceOutcome::Promoted { .. } => None,
        }
    }
}
