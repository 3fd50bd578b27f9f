//! Online Learning with SGD
//!
//! Logistic-loss linear classifier with L2 penalty, updated one mini-batch
//! at a time. Uses the "optimal" step schedule
//! `eta = 1 / (alpha * (t0 + t))`, where `t0` is derived from alpha so the
//! first steps are neither explosive nor vanishing.

use serde::{Deserialize, Serialize};

use crate::logic::features::{FeatureVector, FEATURE_COUNT};
use crate::logic::labels::Label;

/// Logistic loss derivative is clipped beyond this margin
const MAX_MARGIN: f64 = 18.0;

/// Stochastic Gradient Descent classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineClassifier {
    weights: [f64; FEATURE_COUNT],
    bias: f64,
    alpha: f64,
    /// Offset of the step schedule
    t0: f64,
    /// Samples seen so far
    n_updates: u64,
}

impl OnlineClassifier {
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha > 0.0 { alpha } else { crate::constants::DEFAULT_SGD_ALPHA };
        let typw = (1.0 / alpha.sqrt()).sqrt();
        let initial_eta = typw / dloss(-typw, 1.0).abs().max(1.0);

        Self {
            weights: [0.0; FEATURE_COUNT],
            bias: 0.0,
            alpha,
            t0: 1.0 / (initial_eta * alpha),
            n_updates: 0,
        }
    }

    /// One pass over a mini-batch, in order
    pub fn partial_fit(&mut self, batch: &[(FeatureVector, Label)]) {
        for (features, label) in batch {
            self.step(&features.to_f64(), label.as_target());
        }
    }

    fn step(&mut self, x: &[f64; FEATURE_COUNT], y: f64) {
        let eta = 1.0 / (self.alpha * (self.t0 + self.n_updates as f64));
        let p = self.decision(x);
        let update = -eta * dloss(p, y);

        // L2 shrink, then gradient
        let shrink = (1.0 - eta * self.alpha).max(1e-9);
        for (w, xi) in self.weights.iter_mut().zip(x.iter()) {
            *w = *w * shrink + update * xi;
        }
        self.bias += update;
        self.n_updates += 1;
    }

    fn decision(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        self.weights.iter().zip(x.iter()).map(|(w, xi)| w * xi).sum::<f64>() + self.bias
    }

    /// Raw margin (positive leans phishing)
    pub fn decision_function(&self, features: &FeatureVector) -> f64 {
        self.decision(&features.to_f64())
    }

    pub fn predict(&self, features: &FeatureVector) -> Label {
        if self.decision_function(features) > 0.0 {
            Label::Phishing
        } else {
            Label::Legitimate
        }
    }

    /// Probability of the phishing class, `None` if not finite
    pub fn predict_proba(&self, features: &FeatureVector) -> Option<f64> {
        let p = sigmoid(self.decision_function(features));
        p.is_finite().then_some(p)
    }

    pub fn weights(&self) -> &[f64; FEATURE_COUNT] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn n_updates(&self) -> u64 {
        self.n_updates
    }
}

impl Default for OnlineClassifier {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_SGD_ALPHA)
    }
}

/// d(log loss)/dp for margin p and target y in {-1, 1}
fn dloss(p: f64, y: f64) -> f64 {
    let z = p * y;
    if z > MAX_MARGIN {
        -y * (-z).exp()
    } else if z < -MAX_MARGIN {
        -y
    } else {
        -y / (z.exp() + 1.0)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
