//! PhishGuard Core - hybrid continual-learning phishing decision engine

pub mod constants;
pub mod logic;

pub use logic::config::{EngineConfig, FallbackPolicy};
pub use logic::engine::{EngineState, EngineStatus, ScanResult};
pub use logic::labels::{Correctness, Label, Verdict};
