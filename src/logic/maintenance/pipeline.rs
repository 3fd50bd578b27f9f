use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{passes_gate, MaintenanceError, MaintenanceOutcome, MaintenanceReport, MaintenanceState, StateMachine};
use crate::logic::dataset::{load_dataset, LabeledDataset};
use crate::logic::feedback::FeedbackLog;
use crate::logic::features::{FeatureExtractor, FeatureVector};
use crate::logic::model::{AnomalyDetector, ArtifactStore, BatchModelArtifact, EvaluationReport};

/// Builds an untrained batch model
pub type ModelFactory<M> = Arc<dyn Fn() -> M + Send + Sync>;

pub struct MaintenancePipeline<M> {
    dataset_path: PathBuf,
    label_column: String,
    artifacts: ArtifactStore,
    feedback: FeedbackLog,
    extractor: Arc<dyn FeatureExtractor>,
    factory: ModelFactory<M>,
    tolerance: f64,
    /// Phase of the current (or last) run
    state: Mutex<MaintenanceState>,
    run_lock: Mutex<()>,
}

impl<M> MaintenancePipeline<M>
where
    M: AnomalyDetector + Serialize + DeserializeOwned,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dataset_path: impl Into<PathBuf>,
        label_column: impl Into<String>,
        artifacts: ArtifactStore,
        feedback: FeedbackLog,
        extractor: Arc<dyn FeatureExtractor>,
        factory: ModelFactory<M>,
        tolerance: f64,
    ) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            label_column: label_column.into(),
            artifacts,
            feedback,
            extractor,
            factory,
            tolerance,
            state: Mutex::new(MaintenanceState::Idle),
            run_lock: Mutex::new(()),
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn feedback(&self) -> &FeedbackLog {
        &self.feedback
    }

    pub fn state(&self) -> MaintenanceState {
        *self.state.lock()
    }

    /// Run once. Never fails: problems end the run as `Rejected`.
    pub fn run(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::started();

        let Some(_running) = self.run_lock.try_lock() else {
            log::warn!("Maintenance requested while a run is in progress");
            report.outcome = MaintenanceOutcome::Rejected { reason: MaintenanceError::AlreadyRunning.to_string() };
            report.final_state = MaintenanceState::Rejected;
            return report;
        };

        log::info!("Starting maintenance pipeline");
        let mut machine = StateMachine::new();

        match self.execute(&mut machine, &mut report) {
            Ok(version) => {
                report.outcome = MaintenanceOutcome::Promoted { version };
                log::info!("Maintenance: new model {} deployed, feedback log cleared", version);
            }
            Err(e) => {
                if machine.state() != MaintenanceState::Rejected {
                    if let Err(te) = self.step(&mut machine, MaintenanceState::Rejected) {
                        log::error!("Maintenance: {}", te);
                    }
                }
                match &e {
                    MaintenanceError::NoFeedback | MaintenanceError::Regression { .. } => {
                        log::info!("Maintenance rejected: {}", e)
                    }
                    _ => log::error!("Maintenance aborted: {}", e),
                }
                report.outcome = MaintenanceOutcome::Rejected { reason: e.to_string() };
            }
        }

        report.final_state = machine.state();
        if let Err(e) = self.step(&mut machine, MaintenanceState::Idle) {
            log::error!("Maintenance: {}", e);
        }
        report.finished_at = Utc::now();
        report
    }

    fn step(&self, machine: &mut StateMachine, to: MaintenanceState) -> Result<(), MaintenanceError> {
        machine.advance(to)?;
        *self.state.lock() = to;
        Ok(())
    }

    fn execute(&self, machine: &mut StateMachine, report: &mut MaintenanceReport) -> Result<uuid::Uuid, MaintenanceError> {
        // 1. Reference data and the model currently deployed
        self.step(machine, MaintenanceState::Loading)?;

        let dataset = load_dataset(&self.dataset_path, &self.label_column)?;
        let deployed = self.artifacts.load::<M>()?;

        match &deployed {
            Some(artifact) => {
                let baseline = EvaluationReport::compute(&artifact.model, &dataset.evaluation);
                log::info!("{}", baseline.summary("CURRENT MODEL (BEFORE)"));
                report.baseline_accuracy = baseline.accuracy;
                report.baseline_report = Some(baseline);
            }
            None => {
                log::warn!("No deployed model, bootstrapping from scratch");
                report.baseline_accuracy = 0.0;
            }
        }

        // 2. Feedback vectors
        let fresh = self.extract_feedback(report)?;

        // 3. Fit a new model from scratch
        self.step(machine, MaintenanceState::Retraining)?;
        let training = training_set(&dataset, &fresh);
        log::info!(
            "Training new model on {} patterns ({} from feedback)",
            training.len(),
            fresh.len()
        );
        let mut model = (self.factory)();
        model.fit(&training)?;

        // 4. Compare on the same evaluation set
        self.step(machine, MaintenanceState::Evaluating)?;
        let evaluation = EvaluationReport::compute(&model, &dataset.evaluation);
        log::info!("{}", evaluation.summary("NEW MODEL (AFTER)"));
        let new_accuracy = evaluation.accuracy;
        report.new_accuracy = Some(new_accuracy);
        report.new_report = Some(evaluation);

        log::info!(
            "Previous accuracy: {:.2}%, new accuracy: {:.2}%",
            report.baseline_accuracy * 100.0,
            new_accuracy * 100.0
        );

        if !passes_gate(new_accuracy, report.baseline_accuracy, self.tolerance) {
            return Err(MaintenanceError::Regression {
                baseline: report.baseline_accuracy,
                new: new_accuracy,
                tolerance: self.tolerance,
            });
        }

        // 5. Deploy, then clear the log; both or neither
        let artifact = BatchModelArtifact::new(model, training.len());
        let version = artifact.version;
        self.promote(&artifact)?;
        self.step(machine, MaintenanceState::Promoted)?;
        Ok(version)
    }

    fn extract_feedback(&self, report: &mut MaintenanceReport) -> Result<Vec<FeatureVector>, MaintenanceError> {
        let records = self.feedback.read_all()?;
        report.records_read = records.len();
        log::info!("Processing {} feedback records", records.len());

        if records.is_empty() {
            return Err(MaintenanceError::NoFeedback);
        }

        // Taken-down pages still count, as the suspicious default
        let mut vectors = Vec::with_capacity(records.len());
        for record in &records {
            let v = match self.extractor.try_extract(&record.url) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("Feedback for {} unreachable ({}), using suspicious default", record.url, e);
                    report.defaulted += 1;
                    FeatureVector::suspicious_default()
                }
            };
            log::debug!("Feedback {} -> {}", record.url, v);
            vectors.push(v);
        }
        report.extracted = vectors.len();
        Ok(vectors)
    }

    fn promote(&self, artifact: &BatchModelArtifact<M>) -> Result<(), MaintenanceError> {
        let previous = self.artifacts.replace(artifact)?;

        if let Err(e) = self.feedback.truncate() {
            log::error!("Failed to clear feedback log after deploy: {}", e);
            if let Err(restore) = self.artifacts.restore(previous) {
                log::error!("Failed to restore previous model: {}", restore);
                return Err(MaintenanceError::RolledBack(format!(
                    "log truncation failed ({}) and restore failed ({})",
                    e, restore
                )));
            }
            return Err(MaintenanceError::RolledBack(format!("log truncation failed: {}", e)));
        }
        Ok(())
    }
}

/// Reference legitimate pool followed by every extracted feedback vector
fn training_set(dataset: &LabeledDataset, fresh: &[FeatureVector]) -> Vec<FeatureVector> {
    let mut training = Vec::with_capacity(dataset.training_pool.len() + fresh.len());
    training.extend_from_slice(&dataset.training_pool);
    training.extend_from_slice(fresh);
    training
}
