//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every tunable of the engine starts here; `EngineConfig` layers
//! environment variables and config files on top.

use std::path::PathBuf;

/// Pending feedback records that trigger a maintenance run
pub const DEFAULT_FEEDBACK_THRESHOLD: usize = 10;

/// Maximum accuracy regression tolerated by the promotion gate
pub const DEFAULT_PROMOTION_TOLERANCE: f64 = 0.01;

/// Replay memory capacity per class
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;

/// Vectors replayed from the opposite-class memory per update
pub const DEFAULT_REPLAY_SAMPLE_SIZE: usize = 10;

/// Copies of the fresh correction placed in each training batch
pub const CORRECTION_WEIGHT: usize = 2;

/// L2 penalty of the online classifier
pub const DEFAULT_SGD_ALPHA: f64 = 0.001;

/// Isolation forest size
pub const DEFAULT_FOREST_TREES: usize = 300;

/// Isolation forest sub-sample size per tree
pub const DEFAULT_FOREST_MAX_SAMPLES: usize = 256;

/// Expected share of anomalies in the training pool
pub const DEFAULT_CONTAMINATION: f64 = 0.1;

/// Seed shared by the forest and replay sampling
pub const DEFAULT_SEED: u64 = 42;

/// Label column of the canonical dataset
pub const DEFAULT_LABEL_COLUMN: &str = "Result";

/// File names inside the data directory
pub const AGENT_STATE_FILE: &str = "agent_state.json";
pub const ANOMALY_MODEL_FILE: &str = "anomaly_model.json";
pub const FEEDBACK_LOG_FILE: &str = "feedback.csv";
pub const DATASET_FILE: &str = "website_phishing.csv";

/// HTTP timeout for live feature extraction (seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 3;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "PhishGuard";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Default data directory (`$PHISHGUARD_DATA_DIR` or the platform data dir)
pub fn get_data_dir() -> PathBuf {
    std::env::var("PHISHGUARD_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("phishguard")
        })
}

/// Feedback threshold from environment, else `fallback`
pub fn get_feedback_threshold_or(fallback: usize) -> usize {
    env_parse("PHISHGUARD_FEEDBACK_THRESHOLD").unwrap_or(fallback)
}

/// Promotion tolerance from environment, else `fallback`
pub fn get_promotion_tolerance_or(fallback: f64) -> f64 {
    env_parse("PHISHGUARD_PROMOTION_TOLERANCE").unwrap_or(fallback)
}

/// Replay memory capacity from environment, else `fallback`
pub fn get_memory_capacity_or(fallback: usize) -> usize {
    env_parse("PHISHGUARD_MEMORY_CAPACITY").unwrap_or(fallback)
}

/// Replay sample size from environment, else `fallback`
pub fn get_replay_sample_size_or(fallback: usize) -> usize {
    env_parse("PHISHGUARD_REPLAY_SAMPLE_SIZE").unwrap_or(fallback)
}

/// `Some(true)` when `PHISHGUARD_FAIL_CLOSED` asks for fail-closed, `None` if unset
pub fn fail_closed_override() -> Option<bool> {
    std::env::var("PHISHGUARD_FAIL_CLOSED")
        .ok()
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
