//! Logic Module - Business Logic & Engines
//!
//! Decision engine for phishing detection: an online agent that learns from
//! user corrections, a batch anomaly model as its cold-start backstop, and a
//! maintenance pipeline that retrains the batch model from feedback.
//!
//! ## Layout
//! - `features/` - Feature layout, vector type, URL extractors
//! - `agent/` - Online learner with replay memory
//! - `model/` - SGD classifier, isolation forest, artifacts, evaluation
//! - `router/` - Hybrid decision routing and feedback intake
//! - `maintenance/` - Retrain → evaluate → promote pipeline
//! - `engine` - Owned engine state wiring it all together

pub mod config;
pub mod labels;
pub mod storage;

pub mod features;
pub mod agent;
pub mod model;
pub mod dataset;
pub mod feedback;
pub mod maintenance;
pub mod router;
pub mod explain;
pub mod engine;

#[cfg(test)]
pub(crate) mod testing;
