//! Hybrid Decision Router
//!
//! One `classify` entry point over two models: the online agent answers
//! once it has learned anything, the batch anomaly model covers the cold
//! start, and the fallback policy covers the case where neither exists.
//!
//! Feedback flows through here too. Each submission trains the agent and
//! lands in the feedback log; the submission that fills the log to the
//! threshold starts a maintenance run on a background thread. While that
//! run is in flight every call is refused with `EngineBusy` instead of
//! waiting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::agent::PhishingAgent;
use crate::logic::config::FallbackPolicy;
use crate::logic::feedback::{FeedbackError, FeedbackLog, FeedbackRecord};
use crate::logic::features::FeatureVector;
use crate::logic::labels::{Correctness, Label, Verdict};
use crate::logic::maintenance::{MaintenancePipeline, MaintenanceReport};
use crate::logic::model::{AnomalyDetector, BatchModelArtifact};

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("engine busy: maintenance in progress")]
    EngineBusy,

    #[error("failed to record feedback: {0}")]
    FeedbackLog(#[from] FeedbackError),
}

// ============================================================================
// TYPES
// ============================================================================

/// Which component produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Agent,
    BatchModel,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub source: DecisionSource,
    /// Agent probability of the verdict; 1.0 for the batch model, 0.0 for fallback
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedbackReceipt {
    /// The label the user asserted
    pub true_label: Label,
    /// Records waiting in the log
    pub pending: usize,
    pub maintenance_started: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RouterSettings {
    pub feedback_threshold: usize,
    pub fallback: FallbackPolicy,
}

struct FeedbackState {
    log: FeedbackLog,
    pending: usize,
}

/// Clears the in-flight flag when the run ends, even by panic
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared with the maintenance thread
struct Shared<M> {
    pipeline: Arc<MaintenancePipeline<M>>,
    batch: RwLock<Option<BatchModelArtifact<M>>>,
    feedback: Mutex<FeedbackState>,
    last_report: Mutex<Option<MaintenanceReport>>,
}

// ============================================================================
// ROUTER
// ============================================================================

pub struct HybridRouter<M> {
    agent: Arc<PhishingAgent>,
    shared: Arc<Shared<M>>,
    in_flight: Arc<AtomicBool>,
    settings: RouterSettings,
    worker: Mutex<Option<JoinHandle<MaintenanceReport>>>,
}

impl<M> HybridRouter<M>
where
    M: AnomalyDetector + Serialize + DeserializeOwned + 'static,
{
    pub fn new(
        agent: Arc<PhishingAgent>,
        batch: Option<BatchModelArtifact<M>>,
        pipeline: Arc<MaintenancePipeline<M>>,
        settings: RouterSettings,
    ) -> Self {
        let log = pipeline.feedback().clone();
        let pending = log.count().unwrap_or_else(|e| {
            log::warn!("Cannot count pending feedback ({}), assuming none", e);
            0
        });

        Self {
            agent,
            shared: Arc::new(Shared {
                pipeline,
                batch: RwLock::new(batch),
                feedback: Mutex::new(FeedbackState { log, pending }),
                last_report: Mutex::new(None),
            }),
            in_flight: Arc::new(AtomicBool::new(false)),
            settings,
            worker: Mutex::new(None),
        }
    }

    /// Decide on `v`: agent, then batch model, then fallback policy
    pub fn classify(&self, v: &FeatureVector) -> Result<Classification, RouterError> {
        if self.is_busy() {
            return Err(RouterError::EngineBusy);
        }

        let (opinion, confidence) = self.agent.predict(v);
        if let Some(label) = opinion.label() {
            return Ok(Classification {
                verdict: label.into(),
                source: DecisionSource::Agent,
                confidence,
            });
        }

        if let Some(artifact) = self.shared.batch.read().as_ref() {
            return Ok(Classification {
                verdict: artifact.model.predict(v).into(),
                source: DecisionSource::BatchModel,
                confidence: 1.0,
            });
        }

        log::debug!("No model available, applying {:?} fallback", self.settings.fallback);
        Ok(Classification {
            verdict: self.settings.fallback.verdict(),
            source: DecisionSource::Fallback,
            confidence: 0.0,
        })
    }

    /// Record the user's verdict on a shown decision
    pub fn submit_feedback(
        &self,
        v: FeatureVector,
        url: &str,
        shown: Verdict,
        correctness: Correctness,
    ) -> Result<FeedbackReceipt, RouterError> {
        let mut feedback = self.shared.feedback.lock();
        if self.is_busy() {
            return Err(RouterError::EngineBusy);
        }

        let predicted = Label::from(shown);
        let true_label = match self.agent.learn(v, predicted, correctness) {
            Ok(label) => label,
            Err(e) => {
                log::error!("Agent failed to learn from feedback on {}: {}", url, e);
                correctness.resolve(predicted)
            }
        };

        feedback.log.append(&FeedbackRecord::new(url, correctness))?;
        feedback.pending += 1;
        let pending = feedback.pending;

        let maintenance_started = pending >= self.settings.feedback_threshold;
        if maintenance_started {
            self.in_flight.store(true, Ordering::Release);
            log::info!("Feedback threshold reached ({}), starting maintenance", pending);
            self.spawn_maintenance();
        }

        Ok(FeedbackReceipt { true_label, pending, maintenance_started })
    }

    /// Run maintenance on this thread under the same exclusive window
    pub fn run_maintenance_blocking(&self) -> Result<MaintenanceReport, RouterError> {
        {
            let _feedback = self.shared.feedback.lock();
            if self.is_busy() {
                return Err(RouterError::EngineBusy);
            }
            self.in_flight.store(true, Ordering::Release);
        }
        let guard = InFlightGuard(self.in_flight.clone());
        let report = run_and_reload(&self.shared);
        drop(guard);
        Ok(report)
    }

    /// Join the background run, if one was started, and return its report
    pub fn wait_for_maintenance(&self) -> Option<MaintenanceReport> {
        let handle = self.worker.lock().take()?;
        match handle.join() {
            Ok(report) => Some(report),
            Err(_) => {
                log::error!("Maintenance thread panicked");
                None
            }
        }
    }

    pub fn last_maintenance(&self) -> Option<MaintenanceReport> {
        self.shared.last_report.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn pending_feedback(&self) -> usize {
        self.shared.feedback.lock().pending
    }

    /// Version of the batch model currently serving
    pub fn batch_version(&self) -> Option<Uuid> {
        self.shared.batch.read().as_ref().map(|a| a.version)
    }

    pub fn agent(&self) -> &PhishingAgent {
        &self.agent
    }

    pub fn settings(&self) -> RouterSettings {
        self.settings
    }

    /// Caller holds the feedback lock and has set the in-flight flag
    fn spawn_maintenance(&self) {
        let shared = Arc::clone(&self.shared);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        let spawned = std::thread::Builder::new()
            .name("maintenance".into())
            .spawn(move || {
                let _guard = guard;
                run_and_reload(&shared)
            });

        match spawned {
            Ok(handle) => {
                // A finished previous run may still be parked here
                if let Some(old) = self.worker.lock().replace(handle) {
                    let _ = old.join();
                }
            }
            // The closure, and with it the guard, is dropped on failure
            Err(e) => log::error!("Failed to spawn maintenance thread: {}", e),
        }
    }
}

/// Run the pipeline, reload the artifact after a promotion, refresh the
/// pending count and remember the report
fn run_and_reload<M>(shared: &Shared<M>) -> MaintenanceReport
where
    M: AnomalyDetector + Serialize + DeserializeOwned,
{
    let report = shared.pipeline.run();

    if report.is_promoted() {
        match shared.pipeline.artifacts().load::<M>() {
            Ok(Some(artifact)) => {
                log::info!("Batch model reloaded (version {})", artifact.version);
                *shared.batch.write() = Some(artifact);
            }
            Ok(None) => log::error!("Promoted artifact missing on reload"),
            Err(e) => log::error!("Failed to reload promoted artifact: {}", e),
        }
    }

    {
        let mut feedback = shared.feedback.lock();
        feedback.pending = feedback.log.count().unwrap_or_else(|e| {
            log::warn!("Cannot count pending feedback ({}), assuming none", e);
            0
        });
    }

    *shared.last_report.lock() = Some(report.clone());
    report
}
