//! Engine State
//!
//! Owns everything a running engine needs: config, extractor, agent, batch
//! model and maintenance pipeline, all wired into one router.
//!
//! Lifecycle: `init` (load or bootstrap) → serve → reload after promotion.
//! The reload happens inside the router; the engine only builds it.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::agent::{AgentStatus, PhishingAgent};
use crate::logic::config::EngineConfig;
use crate::logic::dataset::load_dataset;
use crate::logic::explain::{explain, Explanation};
use crate::logic::feedback::FeedbackLog;
use crate::logic::features::layout::{layout_hash, FEATURE_VERSION};
use crate::logic::features::{FeatureExtractor, FeatureVector, HttpFeatureExtractor, FEATURE_COUNT};
use crate::logic::labels::{Correctness, Verdict};
use crate::logic::maintenance::{MaintenancePipeline, MaintenanceReport, ModelFactory};
use crate::logic::model::{AnomalyDetector, ArtifactStore, BatchModelArtifact, IsolationForest};
use crate::logic::router::{Classification, FeedbackReceipt, HybridRouter, RouterError, RouterSettings};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_count: usize,

    pub agent: AgentStatus,
    pub model: ModelStatus,
    pub feedback: FeedbackStatus,
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub version: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackStatus {
    pub pending: usize,
    pub threshold: usize,
}

/// Verdict plus the reasons behind it
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub url: String,
    /// Where redirects ended, when the page was reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub features: FeatureVector,
    pub classification: Classification,
    pub explanation: Explanation,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct EngineState<M = IsolationForest> {
    config: EngineConfig,
    extractor: Arc<dyn FeatureExtractor>,
    router: HybridRouter<M>,
}

impl EngineState<IsolationForest> {
    /// Production wiring: HTTP extractor and isolation forest
    pub fn init(config: EngineConfig) -> Self {
        let extractor = Arc::new(HttpFeatureExtractor::with_timeout(Duration::from_secs(config.fetch_timeout_secs)));
        let forest = config.forest.clone();
        let factory: ModelFactory<IsolationForest> = Arc::new(move || IsolationForest::new(forest.clone()));
        Self::init_with(config, extractor, factory)
    }
}

impl<M> EngineState<M>
where
    M: AnomalyDetector + Serialize + DeserializeOwned + 'static,
{
    pub fn init_with(config: EngineConfig, extractor: Arc<dyn FeatureExtractor>, factory: ModelFactory<M>) -> Self {
        log::info!("Data directory: {}", config.data_dir.display());

        let agent = PhishingAgent::open(config.agent_state_path(), config.agent_config());
        let artifacts = ArtifactStore::new(config.anomaly_model_path());
        let batch = load_or_bootstrap(&config, &artifacts, &factory);

        let pipeline = MaintenancePipeline::new(
            config.dataset_path(),
            config.label_column.clone(),
            artifacts,
            FeedbackLog::new(config.feedback_log_path()),
            Arc::clone(&extractor),
            factory,
            config.promotion_tolerance,
        );

        let settings = RouterSettings {
            feedback_threshold: config.feedback_threshold,
            fallback: config.fallback,
        };
        let router = HybridRouter::new(Arc::new(agent), batch, Arc::new(pipeline), settings);

        Self { config, extractor, router }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn router(&self) -> &HybridRouter<M> {
        &self.router
    }

    /// Extract, classify and explain one URL
    pub fn scan(&self, url: &str) -> Result<ScanResult, RouterError> {
        let (features, final_url) = self.extractor.extract_resolved(url);
        let classification = self.router.classify(&features)?;
        log::info!(
            "Scan {}: {} via {:?} ({:.2})",
            url,
            classification.verdict,
            classification.source,
            classification.confidence
        );
        Ok(ScanResult {
            url: url.to_string(),
            final_url,
            features,
            classification,
            explanation: explain(&features),
        })
    }

    /// Feedback on a URL as shown to the user; the vector is re-extracted
    pub fn feedback(&self, url: &str, shown: Verdict, correctness: Correctness) -> Result<FeedbackReceipt, RouterError> {
        let features = self.extractor.extract(url);
        self.router.submit_feedback(features, url, shown, correctness)
    }

    pub fn maintain(&self) -> Result<MaintenanceReport, RouterError> {
        self.router.run_maintenance_blocking()
    }

    /// Block until a background maintenance run, if any, has finished
    pub fn shutdown(&self) -> Option<MaintenanceReport> {
        self.router.wait_for_maintenance()
    }

    pub fn status(&self) -> EngineStatus {
        let version = self.router.batch_version();
        EngineStatus {
            feature_version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            agent: self.router.agent().status(),
            model: ModelStatus { loaded: version.is_some(), version },
            feedback: FeedbackStatus {
                pending: self.router.pending_feedback(),
                threshold: self.config.feedback_threshold,
            },
            busy: self.router.is_busy(),
        }
    }
}

/// Deployed artifact, or a fresh one fitted on the reference dataset
fn load_or_bootstrap<M>(config: &EngineConfig, store: &ArtifactStore, factory: &ModelFactory<M>) -> Option<BatchModelArtifact<M>>
where
    M: AnomalyDetector + Serialize + DeserializeOwned,
{
    match store.load::<M>() {
        Ok(Some(artifact)) => {
            log::info!(
                "Batch model loaded (version {}, trained on {} patterns)",
                artifact.version,
                artifact.training_size
            );
            return Some(artifact);
        }
        Ok(None) => log::info!("No batch model deployed, bootstrapping"),
        Err(e) => {
            // Left in place: maintenance refuses to overwrite it until fixed
            log::error!("Deployed batch model unusable: {}", e);
            return None;
        }
    }

    let dataset = match load_dataset(&config.dataset_path(), &config.label_column) {
        Ok(d) => d,
        Err(e) => {
            log::warn!("Cannot bootstrap batch model ({}), serving without it", e);
            return None;
        }
    };

    let mut model = factory();
    if let Err(e) = model.fit(&dataset.training_pool) {
        log::warn!("Bootstrap training failed: {}", e);
        return None;
    }

    let artifact = BatchModelArtifact::new(model, dataset.training_pool.len());
    if let Err(e) = store.save(&artifact) {
        log::error!("Failed to save bootstrap model: {}", e);
    } else {
        log::info!("Bootstrap batch model {} deployed", artifact.version);
    }
    Some(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::FallbackPolicy;
    use crate::logic::features::ExtractError;
    use crate::logic::router::DecisionSource;
    use crate::logic::testing::{nth, write_dataset, MapExtractor, MemoDetector};
    use tempfile::tempdir;

    fn memo_factory() -> ModelFactory<MemoDetector> {
        Arc::new(MemoDetector::default)
    }

    #[test]
    fn test_bootstrap_from_dataset() {
        let dir = tempdir().unwrap();
        let legit: Vec<_> = (0..20).map(nth).collect();
        write_dataset(&dir.path().join("website_phishing.csv"), &legit, &[nth(500)]);

        let extractor = Arc::new(MapExtractor::new([("http://known.example".to_string(), nth(3))]));
        let engine = EngineState::init_with(EngineConfig::with_data_dir(dir.path()), extractor, memo_factory());

        assert!(dir.path().join("anomaly_model.json").exists());
        let status = engine.status();
        assert!(status.model.loaded);
        assert_eq!(status.feature_count, 9);

        let scan = engine.scan("http://known.example").unwrap();
        assert_eq!(scan.classification.source, DecisionSource::BatchModel);
        assert_eq!(scan.classification.verdict, Verdict::Benign);
        assert!(scan.final_url.is_none());
    }

    struct RedirectingExtractor;

    impl FeatureExtractor for RedirectingExtractor {
        fn try_extract(&self, _url: &str) -> Result<FeatureVector, ExtractError> {
            Ok(nth(3))
        }

        fn extract_resolved(&self, url: &str) -> (FeatureVector, Option<String>) {
            (self.extract(url), Some("https://landing.example/login".to_string()))
        }
    }

    #[test]
    fn test_scan_reports_final_url() {
        let dir = tempdir().unwrap();
        let engine = EngineState::init_with(
            EngineConfig::with_data_dir(dir.path()),
            Arc::new(RedirectingExtractor),
            memo_factory(),
        );

        let scan = engine.scan("http://short.example").unwrap();
        assert_eq!(scan.url, "http://short.example");
        assert_eq!(scan.final_url.as_deref(), Some("https://landing.example/login"));
        assert_eq!(scan.features, nth(3));
    }

    #[test]
    fn test_no_dataset_serves_with_fallback() {
        let dir = tempdir().unwrap();
        let mut config = EngineConfig::with_data_dir(dir.path());
        config.fallback = FallbackPolicy::Closed;

        let engine = EngineState::init_with(config, Arc::new(MapExtractor::default()), memo_factory());
        assert!(!engine.status().model.loaded);

        // Unknown URL extracts to the suspicious default, decided by fallback
        let scan = engine.scan("http://unknown.example").unwrap();
        assert_eq!(scan.features, FeatureVector::suspicious_default());
        assert_eq!(scan.classification.source, DecisionSource::Fallback);
        assert_eq!(scan.classification.verdict, Verdict::Threat);
        assert!(!scan.explanation.risks.is_empty());
    }

    #[test]
    fn test_existing_artifact_is_not_retrained() {
        let dir = tempdir().unwrap();
        write_dataset(&dir.path().join("website_phishing.csv"), &[nth(1)], &[nth(2)]);
        let store = ArtifactStore::new(dir.path().join("anomaly_model.json"));
        let deployed = BatchModelArtifact::new(MemoDetector::trained_on(&[nth(9)]), 1);
        store.save(&deployed).unwrap();

        let engine = EngineState::init_with(
            EngineConfig::with_data_dir(dir.path()),
            Arc::new(MapExtractor::default()),
            memo_factory(),
        );
        assert_eq!(engine.status().model.version, Some(deployed.version));
    }

    #[test]
    fn test_feedback_reaches_agent_and_log() {
        let dir = tempdir().unwrap();
        let extractor = Arc::new(MapExtractor::new([("http://a.example".to_string(), nth(4))]));
        let engine = EngineState::init_with(EngineConfig::with_data_dir(dir.path()), extractor, memo_factory());

        let receipt = engine.feedback("http://a.example", Verdict::Benign, Correctness::Incorrect).unwrap();
        assert_eq!(receipt.pending, 1);

        let status = engine.status();
        assert!(status.agent.fitted);
        assert_eq!(status.agent.phish_memory, 1);
        assert_eq!(status.feedback.pending, 1);

        let scan = engine.scan("http://a.example").unwrap();
        assert_eq!(scan.classification.source, DecisionSource::Agent);
        assert_eq!(scan.classification.verdict, Verdict::Threat);
    }
}
