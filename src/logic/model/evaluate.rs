//! Model Evaluation
//!
//! Accuracy of a batch model on the fixed evaluation set, plus a per-class
//! precision/recall breakdown that maintenance logs for every run.

use serde::{Deserialize, Serialize};

use super::{AnomalyDetector, AnomalyVerdict};
use crate::logic::features::FeatureVector;

/// Per-class metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    /// Anomaly (phishing) class
    pub anomaly: ClassMetrics,
    /// Legitimate class
    pub legitimate: ClassMetrics,
    pub samples: usize,
}

impl EvaluationReport {
    /// Score `model` on `(vector, expected)` pairs
    pub fn compute<M: AnomalyDetector + ?Sized>(model: &M, samples: &[(FeatureVector, AnomalyVerdict)]) -> Self {
        let predictions: Vec<AnomalyVerdict> = samples.iter().map(|(v, _)| model.predict(v)).collect();
        let expected: Vec<AnomalyVerdict> = samples.iter().map(|(_, e)| *e).collect();
        Self::from_predictions(&expected, &predictions)
    }

    pub fn from_predictions(expected: &[AnomalyVerdict], predicted: &[AnomalyVerdict]) -> Self {
        let n = expected.len().min(predicted.len());
        if n == 0 {
            return Self::default();
        }

        let correct = expected.iter().zip(predicted).filter(|(e, p)| e == p).count();

        Self {
            accuracy: correct as f64 / n as f64,
            anomaly: class_metrics(expected, predicted, AnomalyVerdict::Anomaly),
            legitimate: class_metrics(expected, predicted, AnomalyVerdict::Legitimate),
            samples: n,
        }
    }

    /// Multi-line summary in the shape of a classification report
    pub fn summary(&self, stage: &str) -> String {
        format!(
            "Evaluation: {stage}\n\
             Global accuracy: {:.2}%\n\
             {:<22}{:>10}{:>10}{:>10}{:>10}\n\
             {:<22}{:>10.2}{:>10.2}{:>10.2}{:>10}\n\
             {:<22}{:>10.2}{:>10.2}{:>10.2}{:>10}",
            self.accuracy * 100.0,
            "", "precision", "recall", "f1-score", "support",
            "Anomaly (Phishing)", self.anomaly.precision, self.anomaly.recall, self.anomaly.f1, self.anomaly.support,
            "Normal (Legitimate)", self.legitimate.precision, self.legitimate.recall, self.legitimate.f1, self.legitimate.support,
        )
    }
}

fn class_metrics(expected: &[AnomalyVerdict], predicted: &[AnomalyVerdict], class: AnomalyVerdict) -> ClassMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (e, p) in expected.iter().zip(predicted) {
        match (*e == class, *p == class) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassMetrics { precision, recall, f1, support: tp + fn_ }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Accuracy of `model` on the evaluation set
pub fn accuracy<M: AnomalyDetector + ?Sized>(model: &M, samples: &[(FeatureVector, AnomalyVerdict)]) -> f64 {
    EvaluationReport::compute(model, samples).accuracy
}
