//! Isolation Forest - Batch Anomaly Detector
//!
//! Unsupervised detector trained on vectors believed to be legitimate.
//! Anomalies isolate in fewer random splits, so a short average path
//! length means a high anomaly score.
//!
//! Fitting is deterministic for a given training set and config (seeded
//! `StdRng`), which the promotion gate relies on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{AnomalyDetector, AnomalyVerdict, FitError};
use crate::constants::{
    DEFAULT_CONTAMINATION, DEFAULT_FOREST_MAX_SAMPLES, DEFAULT_FOREST_TREES, DEFAULT_SEED,
};
use crate::logic::features::{FeatureVector, FEATURE_COUNT};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_samples: usize,
    /// Expected share of outliers in the training set (0.0 - 0.5)
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_FOREST_TREES,
            max_samples: DEFAULT_FOREST_MAX_SAMPLES,
            contamination: DEFAULT_CONTAMINATION,
            seed: DEFAULT_SEED,
        }
    }
}

// ============================================================================
// TREES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// Flat arena; index 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(samples: &[[f64; FEATURE_COUNT]], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..samples.len()).collect();
        tree.grow(samples, indices, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        samples: &[[f64; FEATURE_COUNT]],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: indices.len() });

        if depth >= height_limit || indices.len() <= 1 {
            return id;
        }

        // Only features that still vary can split this node
        let mut candidates: Vec<(usize, f64, f64)> = Vec::new();
        for feature in 0..FEATURE_COUNT {
            let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
            for &i in &indices {
                lo = lo.min(samples[i][feature]);
                hi = hi.max(samples[i][feature]);
            }
            if hi > lo {
                candidates.push((feature, lo, hi));
            }
        }

        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| samples[i][feature] < threshold);

        let left = self.grow(samples, left_idx, depth + 1, height_limit, rng);
        let right = self.grow(samples, right_idx, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    fn path_length(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { feature, threshold, left, right } => {
                    node = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// FOREST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    config: ForestConfig,
    trees: Vec<IsolationTree>,
    /// Sub-sample size actually used
    sample_size: usize,
    /// Scores above this are anomalies
    threshold: f64,
}

impl IsolationForest {
    pub fn new(config: ForestConfig) -> Self {
        Self { config, trees: Vec::new(), sample_size: 0, threshold: 1.0 }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn score_raw(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size).max(f64::EPSILON);
        2f64.powf(-mean_path / norm)
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, training: &[FeatureVector]) -> Result<(), FitError> {
        if training.is_empty() {
            return Err(FitError::EmptyTrainingSet);
        }
        if self.config.n_trees == 0 || self.config.max_samples == 0 {
            return Err(FitError::InvalidConfig("n_trees and max_samples must be positive".into()));
        }
        if !(0.0..=0.5).contains(&self.config.contamination) {
            return Err(FitError::InvalidConfig(format!(
                "contamination {} outside [0, 0.5]",
                self.config.contamination
            )));
        }

        let samples: Vec<[f64; FEATURE_COUNT]> = training.iter().map(|v| v.to_f64()).collect();
        let sample_size = self.config.max_samples.min(samples.len());
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut trees = Vec::with_capacity(self.config.n_trees);
        for _ in 0..self.config.n_trees {
            let picked: Vec<[f64; FEATURE_COUNT]> =
                rand::seq::index::sample(&mut rng, samples.len(), sample_size)
                    .into_iter()
                    .map(|i| samples[i])
                    .collect();
            trees.push(IsolationTree::build(&picked, height_limit, &mut rng));
        }

        self.trees = trees;
        self.sample_size = sample_size;

        let mut scores: Vec<f64> = samples.iter().map(|x| self.score_raw(x)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.threshold = percentile(&scores, 1.0 - self.config.contamination);

        log::debug!(
            "Isolation forest fitted: {} trees, sample size {}, threshold {:.4}",
            self.trees.len(),
            self.sample_size,
            self.threshold
        );
        Ok(())
    }

    /// In (0, 1]; 0.0 before fitting
    fn score(&self, features: &FeatureVector) -> f64 {
        self.score_raw(&features.to_f64())
    }

    fn predict(&self, features: &FeatureVector) -> AnomalyVerdict {
        if self.score(features) > self.threshold {
            AnomalyVerdict::Anomaly
        } else {
            AnomalyVerdict::Legitimate
        }
    }
}

/// Linear-interpolated quantile of sorted values, q in [0, 1]
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::INFINITY;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
