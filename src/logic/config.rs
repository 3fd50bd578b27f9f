//! Engine Configuration
//!
//! Defaults come from `constants`, then an optional JSON file, then
//! `PHISHGUARD_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{self, *};
use crate::logic::agent::AgentConfig;
use crate::logic::labels::Verdict;
use crate::logic::model::ForestConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Verdict when neither the agent nor a batch model can decide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Benign
    #[default]
    Open,
    /// Threat
    Closed,
}

impl FallbackPolicy {
    pub fn verdict(self) -> Verdict {
        match self {
            FallbackPolicy::Open => Verdict::Benign,
            FallbackPolicy::Closed => Verdict::Threat,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Reference dataset; defaults to `<data_dir>/website_phishing.csv`
    pub dataset_path: Option<PathBuf>,
    pub label_column: String,

    pub feedback_threshold: usize,
    pub promotion_tolerance: f64,
    pub fallback: FallbackPolicy,

    pub memory_capacity: usize,
    pub replay_sample_size: usize,
    pub sgd_alpha: f64,

    pub forest: ForestConfig,

    pub fetch_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            dataset_path: None,
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            feedback_threshold: DEFAULT_FEEDBACK_THRESHOLD,
            promotion_tolerance: DEFAULT_PROMOTION_TOLERANCE,
            fallback: FallbackPolicy::Open,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            replay_sample_size: DEFAULT_REPLAY_SAMPLE_SIZE,
            sgd_alpha: DEFAULT_SGD_ALPHA,
            forest: ForestConfig::default(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Self::default() }
    }

    /// Optional JSON file, then environment overrides
    pub fn resolve(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::with_data_dir(constants::get_data_dir()),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("PHISHGUARD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("PHISHGUARD_DATASET") {
            self.dataset_path = Some(PathBuf::from(path));
        }
        self.feedback_threshold = constants::get_feedback_threshold_or(self.feedback_threshold);
        self.promotion_tolerance = constants::get_promotion_tolerance_or(self.promotion_tolerance);
        self.memory_capacity = constants::get_memory_capacity_or(self.memory_capacity);
        self.replay_sample_size = constants::get_replay_sample_size_or(self.replay_sample_size);
        if let Some(closed) = constants::fail_closed_override() {
            self.fallback = if closed { FallbackPolicy::Closed } else { FallbackPolicy::Open };
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feedback_threshold == 0 {
            return Err(ConfigError::Invalid("feedback_threshold must be at least 1".into()));
        }
        if !self.promotion_tolerance.is_finite() || self.promotion_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "promotion_tolerance {} must be a non-negative number",
                self.promotion_tolerance
            )));
        }
        if self.memory_capacity == 0 {
            return Err(ConfigError::Invalid("memory_capacity must be at least 1".into()));
        }
        if !(self.sgd_alpha > 0.0) {
            return Err(ConfigError::Invalid(format!("sgd_alpha {} must be positive", self.sgd_alpha)));
        }
        if self.forest.n_trees == 0 || self.forest.max_samples == 0 {
            return Err(ConfigError::Invalid("forest size and sub-sample must be positive".into()));
        }
        Ok(())
    }

    pub fn agent_state_path(&self) -> PathBuf {
        self.data_dir.join(AGENT_STATE_FILE)
    }

    pub fn anomaly_model_path(&self) -> PathBuf {
        self.data_dir.join(ANOMALY_MODEL_FILE)
    }

    pub fn feedback_log_path(&self) -> PathBuf {
        self.data_dir.join(FEEDBACK_LOG_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.dataset_path.clone().unwrap_or_else(|| self.data_dir.join(DATASET_FILE))
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            memory_capacity: self.memory_capacity,
            replay_sample_size: self.replay_sample_size,
            alpha: self.sgd_alpha,
            seed: self.forest.seed,
        }
    }
}
