//! Online Learning Agent
//!
//! Linear classifier updated one correction at a time, backed by a replay
//! memory of past corrections. Each lesson is replayed against a sample of
//! the opposite class so a single correction cannot swing the model too far.
//!
//! The agent persists its classifier and memory as one blob. `learn` works on
//! a copy and only swaps it in after the blob is on disk.

pub mod memory;

use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CORRECTION_WEIGHT, DEFAULT_MEMORY_CAPACITY, DEFAULT_REPLAY_SAMPLE_SIZE, DEFAULT_SEED, DEFAULT_SGD_ALPHA,
};
use crate::logic::features::FeatureVector;
use crate::logic::labels::{Correctness, Label, Opinion};
use crate::logic::model::OnlineClassifier;
use crate::logic::storage::{self, StorageError};

pub use memory::{BoundedSet, RecordOutcome, ReplayMemory};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to persist agent state: {0}")]
    Persist(#[from] StorageError),
}

// ============================================================================
// CONFIG & STATE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Per-class replay memory capacity
    pub memory_capacity: usize,
    /// Opposite-class vectors replayed with every lesson
    pub replay_sample_size: usize,
    pub alpha: f64,
    /// Seed of the replay sampler
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            replay_sample_size: DEFAULT_REPLAY_SAMPLE_SIZE,
            alpha: DEFAULT_SGD_ALPHA,
            seed: DEFAULT_SEED,
        }
    }
}

/// Everything the agent persists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub classifier: OnlineClassifier,
    pub fitted: bool,
    #[serde(default)]
    pub memory: ReplayMemory,
}

impl AgentState {
    pub fn fresh(alpha: f64) -> Self {
        Self {
            classifier: OnlineClassifier::new(alpha),
            fitted: false,
            memory: ReplayMemory::new(),
        }
    }
}

/// Snapshot for status output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub fitted: bool,
    pub safe_memory: usize,
    pub phish_memory: usize,
    pub updates: u64,
}

// ============================================================================
// AGENT
// ============================================================================

pub struct PhishingAgent {
    state: RwLock<AgentState>,
    /// Serializes `learn`; also owns the replay sampler
    learn_lock: Mutex<StdRng>,
    config: AgentConfig,
    state_path: Option<PathBuf>,
}

impl PhishingAgent {
    /// Load from `path`, starting cold if the blob is missing or unusable
    pub fn open(path: impl Into<PathBuf>, config: AgentConfig) -> Self {
        let path = path.into();
        let state = match storage::load_blob::<AgentState>(&path) {
            Ok(Some(mut state)) => {
                state.memory.shrink_to(config.memory_capacity);
                log::info!(
                    "Agent state loaded (fitted: {}, safe: {}, phish: {})",
                    state.fitted,
                    state.memory.safe().len(),
                    state.memory.phish().len()
                );
                state
            }
            Ok(None) => {
                log::info!("No agent state at {}, starting cold", path.display());
                AgentState::fresh(config.alpha)
            }
            Err(e) => {
                log::warn!("Agent state at {} unusable ({}), starting cold", path.display(), e);
                AgentState::fresh(config.alpha)
            }
        };

        Self::build(state, config, Some(path))
    }

    /// Agent without a backing file
    pub fn in_memory(config: AgentConfig) -> Self {
        Self::build(AgentState::fresh(config.alpha), config, None)
    }

    fn build(state: AgentState, config: AgentConfig, state_path: Option<PathBuf>) -> Self {
        Self {
            state: RwLock::new(state),
            learn_lock: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            state_path,
        }
    }

    /// Opinion and confidence for `v`; `NoOpinion` with 0.0 before any lesson
    pub fn predict(&self, v: &FeatureVector) -> (Opinion, f64) {
        let state = self.state.read();
        if !state.fitted {
            return (Opinion::NoOpinion, 0.0);
        }

        let label = state.classifier.predict(v);
        let confidence = match state.classifier.predict_proba(v) {
            Some(p) => match label {
                Label::Phishing => p,
                Label::Legitimate => 1.0 - p,
            },
            None => 0.5,
        };
        (Opinion::Label(label), confidence)
    }

    /// Learn from feedback on `predicted`; returns the label the user asserted
    pub fn learn(&self, v: FeatureVector, predicted: Label, correctness: Correctness) -> Result<Label, AgentError> {
        let mut rng = self.learn_lock.lock();
        let true_label = correctness.resolve(predicted);

        let mut next = self.state.read().clone();

        let outcome = next.memory.record(v, true_label, self.config.memory_capacity);
        if outcome.contradiction_resolved {
            log::info!("Agent: {} moved to {} memory", v, true_label);
        }
        if !outcome.evicted.is_empty() {
            log::debug!("Agent: evicted {} oldest memories", outcome.evicted.len());
        }

        let opposite = true_label.complement();
        let replay = next.memory.set(opposite).sample(&mut *rng, self.config.replay_sample_size);

        let mut batch = Vec::with_capacity(CORRECTION_WEIGHT + replay.len());
        batch.extend(std::iter::repeat((v, true_label)).take(CORRECTION_WEIGHT));
        batch.extend(replay.into_iter().map(|r| (r, opposite)));

        next.classifier.partial_fit(&batch);
        next.fitted = true;

        if let Some(path) = &self.state_path {
            if let Err(e) = storage::save_blob(path, &next) {
                log::error!("Agent: failed to persist state, lesson discarded: {}", e);
                return Err(e.into());
            }
        }

        *self.state.write() = next;
        log::debug!("Agent learned {} ({} samples in batch)", true_label, batch.len());
        Ok(true_label)
    }

    pub fn is_fitted(&self) -> bool {
        self.state.read().fitted
    }

    /// (safe, phish)
    pub fn memory_sizes(&self) -> (usize, usize) {
        let state = self.state.read();
        (state.memory.safe().len(), state.memory.phish().len())
    }

    pub fn contains_safe(&self, v: &FeatureVector) -> bool {
        self.state.read().memory.safe().contains(v)
    }

    pub fn contains_phish(&self, v: &FeatureVector) -> bool {
        self.state.read().memory.phish().contains(v)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    pub fn status(&self) -> AgentStatus {
        let state = self.state.read();
        AgentStatus {
            fitted: state.fitted,
            safe_memory: state.memory.safe().len(),
            phish_memory: state.memory.phish().len(),
            updates: state.classifier.n_updates(),
        }
    }
}
