use super::*;
use super::pipeline::ModelFactory;
use crate::logic::feedback::{FeedbackLog, FeedbackRecord};
use crate::logic::features::FeatureVector;
use crate::logic::labels::Correctness;
use crate::logic::model::{
    AnomalyDetector, AnomalyVerdict, ArtifactStore, BatchModelArtifact, ForestConfig, IsolationForest,
};
use crate::logic::testing::{nth, write_dataset, MapExtractor, MemoDetector};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

/// 100 legitimate rows, 50 phishing rows of which 28 share a vector with a
/// legitimate row, so no memorizing model can beat 122/150.
fn scenario_dir() -> TempDir {
    let dir = tempdir().unwrap();
    let legit: Vec<FeatureVector> = (0..100).map(nth).collect();
    let phish: Vec<FeatureVector> = (0..28).chain(1000..1022).map(nth).collect();
    write_dataset(&dir.path().join("website_phishing.csv"), &legit, &phish);
    dir
}

fn deploy(dir: &Path, model: MemoDetector) {
    ArtifactStore::new(dir.join("anomaly_model.json"))
        .save(&BatchModelArtifact::new(model, 0))
        .unwrap();
}

fn log_feedback(dir: &Path, urls: &[String]) {
    let log = FeedbackLog::new(dir.join("feedback.csv"));
    for url in urls {
        log.append(&FeedbackRecord::new(url.clone(), Correctness::Correct)).unwrap();
    }
}

fn build_pipeline<M>(dir: &Path, extractor: MapExtractor, factory: ModelFactory<M>) -> MaintenancePipeline<M>
where
    M: AnomalyDetector + serde::Serialize + serde::de::DeserializeOwned,
{
    MaintenancePipeline::new(
        dir.join("website_phishing.csv"),
        "Result",
        ArtifactStore::new(dir.join("anomaly_model.json")),
        FeedbackLog::new(dir.join("feedback.csv")),
        Arc::new(extractor),
        factory,
        0.01,
    )
}

fn memo_factory() -> ModelFactory<MemoDetector> {
    Arc::new(MemoDetector::default)
}

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("http://feedback-{i}.example")).collect()
}

fn snapshot(path: &Path) -> Option<Vec<u8>> {
    fs::read(path).ok()
}

#[test]
fn test_gate_boundaries() {
    assert!(passes_gate(0.81, 0.80, 0.01));
    assert!(passes_gate(0.79, 0.80, 0.01 + 1e-12));
    assert!(!passes_gate(0.78, 0.80, 0.01));
    assert!(passes_gate(0.0, 0.0, 0.01));
}

#[test]
fn test_scenario_improvement_is_promoted() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&(0..98).map(nth).collect::<Vec<_>>()));

    let feedback = urls(10);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().map(|u| (u.clone(), nth(50))));
    let before = snapshot(&dir.path().join("anomaly_model.json"));

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();

    assert!(report.is_promoted(), "{:?}", report.outcome);
    assert!((report.baseline_accuracy - 0.80).abs() < 1e-9);
    assert!((report.new_accuracy.unwrap() - 122.0 / 150.0).abs() < 1e-9);
    assert_eq!(report.records_read, 10);
    assert_eq!(report.extracted, 10);
    assert_eq!(report.final_state, MaintenanceState::Promoted);

    // Artifact replaced, log emptied
    assert_ne!(snapshot(&dir.path().join("anomaly_model.json")), before);
    assert_eq!(FeedbackLog::new(dir.path().join("feedback.csv")).count().unwrap(), 0);

    let deployed: BatchModelArtifact<MemoDetector> =
        ArtifactStore::new(dir.path().join("anomaly_model.json")).load().unwrap().unwrap();
    assert_eq!(deployed.training_size, 110);
}

#[test]
fn test_small_regression_within_tolerance_is_promoted() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&(0..100).map(nth).collect::<Vec<_>>()));

    // Memorizing one phishing vector costs exactly one row
    let feedback = urls(1);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new([(feedback[0].clone(), nth(1000))]);

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();
    assert!(report.is_promoted(), "{:?}", report.outcome);
    assert!(report.new_accuracy.unwrap() < report.baseline_accuracy);
}

#[test]
fn test_regression_is_rejected_byte_identical() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&(0..98).map(nth).collect::<Vec<_>>()));

    let feedback = urls(4);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().enumerate().map(|(i, u)| (u.clone(), nth(1000 + i))));

    let model_before = snapshot(&dir.path().join("anomaly_model.json"));
    let log_before = snapshot(&dir.path().join("feedback.csv"));

    let p = build_pipeline(dir.path(), extractor, memo_factory());
    let report = p.run();

    assert!(!report.is_promoted());
    assert!(report.rejection_reason().unwrap().contains("regressed"));
    assert!((report.new_accuracy.unwrap() - 118.0 / 150.0).abs() < 1e-9);
    assert_eq!(report.final_state, MaintenanceState::Rejected);
    assert_eq!(p.state(), MaintenanceState::Idle);

    assert_eq!(snapshot(&dir.path().join("anomaly_model.json")), model_before);
    assert_eq!(snapshot(&dir.path().join("feedback.csv")), log_before);
}

#[test]
fn test_unreachable_feedback_trains_on_suspicious_default() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&(0..100).map(nth).collect::<Vec<_>>()));
    log_feedback(dir.path(), &urls(10));

    // Every page is gone by the time maintenance runs
    let report = build_pipeline(dir.path(), MapExtractor::default(), memo_factory()).run();

    assert!(report.is_promoted(), "{:?}", report.outcome);
    assert_eq!(report.records_read, 10);
    assert_eq!(report.extracted, 10);
    assert_eq!(report.defaulted, 10);
    assert_eq!(FeedbackLog::new(dir.path().join("feedback.csv")).count().unwrap(), 0);

    let deployed: BatchModelArtifact<MemoDetector> =
        ArtifactStore::new(dir.path().join("anomaly_model.json")).load().unwrap().unwrap();
    assert_eq!(deployed.training_size, 110);
    assert_eq!(deployed.model.predict(&FeatureVector::suspicious_default()), AnomalyVerdict::Legitimate);
}

#[test]
fn test_partial_extraction_failures_use_default() {
    let dir = scenario_dir();
    let feedback = urls(5);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new([(feedback[1].clone(), nth(3)), (feedback[4].clone(), nth(4))]);

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();
    assert!(report.is_promoted());
    assert_eq!(report.extracted, 5);
    assert_eq!(report.defaulted, 3);

    let deployed: BatchModelArtifact<MemoDetector> =
        ArtifactStore::new(dir.path().join("anomaly_model.json")).load().unwrap().unwrap();
    assert_eq!(deployed.training_size, 105);
}

#[test]
fn test_empty_feedback_log_is_noop() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&[nth(0)]));
    FeedbackLog::new(dir.path().join("feedback.csv")).truncate().unwrap();

    let model_before = snapshot(&dir.path().join("anomaly_model.json"));
    let report = build_pipeline(dir.path(), MapExtractor::default(), memo_factory()).run();

    assert!(!report.is_promoted());
    assert!(report.rejection_reason().unwrap().contains("empty"));
    assert!(report.new_accuracy.is_none());
    assert_eq!(snapshot(&dir.path().join("anomaly_model.json")), model_before);
}

#[test]
fn test_failed_log_clear_rolls_back_promotion() {
    let dir = scenario_dir();
    deploy(dir.path(), MemoDetector::trained_on(&(0..98).map(nth).collect::<Vec<_>>()));
    let feedback = urls(3);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().map(|u| (u.clone(), nth(50))));

    let model_before = snapshot(&dir.path().join("anomaly_model.json"));
    let log_before = snapshot(&dir.path().join("feedback.csv"));
    fs::create_dir(dir.path().join("feedback.csv.tmp")).unwrap();

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();

    assert!(!report.is_promoted());
    assert!(report.rejection_reason().unwrap().contains("rolled back"));
    assert_eq!(report.final_state, MaintenanceState::Rejected);
    assert_eq!(snapshot(&dir.path().join("anomaly_model.json")), model_before);
    assert_eq!(snapshot(&dir.path().join("feedback.csv")), log_before);
}

#[test]
fn test_missing_feedback_log_is_noop() {
    let dir = scenario_dir();
    let report = build_pipeline(dir.path(), MapExtractor::default(), memo_factory()).run();

    assert!(!report.is_promoted());
    assert_eq!(report.records_read, 0);
    assert!(!dir.path().join("anomaly_model.json").exists());
}

#[test]
fn test_missing_dataset_aborts() {
    let dir = tempdir().unwrap();
    deploy(dir.path(), MemoDetector::trained_on(&[nth(0)]));
    let feedback = urls(2);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().map(|u| (u.clone(), nth(1))));

    let model_before = snapshot(&dir.path().join("anomaly_model.json"));
    let log_before = snapshot(&dir.path().join("feedback.csv"));

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();

    assert!(!report.is_promoted());
    assert!(report.rejection_reason().unwrap().contains("dataset"));
    assert_eq!(snapshot(&dir.path().join("anomaly_model.json")), model_before);
    assert_eq!(snapshot(&dir.path().join("feedback.csv")), log_before);
}

#[test]
fn test_corrupt_artifact_aborts() {
    let dir = scenario_dir();
    fs::write(dir.path().join("anomaly_model.json"), b"{\"broken\": true}").unwrap();
    let feedback = urls(2);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().map(|u| (u.clone(), nth(1))));
    let log_before = snapshot(&dir.path().join("feedback.csv"));

    let report = build_pipeline(dir.path(), extractor, memo_factory()).run();

    assert!(!report.is_promoted());
    assert!(report.rejection_reason().unwrap().contains("deployed model"));
    assert_eq!(fs::read(dir.path().join("anomaly_model.json")).unwrap(), b"{\"broken\": true}");
    assert_eq!(snapshot(&dir.path().join("feedback.csv")), log_before);
}

#[test]
fn test_bootstrap_with_isolation_forest() {
    let dir = scenario_dir();
    let feedback = urls(3);
    log_feedback(dir.path(), &feedback);
    let extractor = MapExtractor::new(feedback.iter().map(|u| (u.clone(), nth(7))));

    let factory: ModelFactory<IsolationForest> =
        Arc::new(|| IsolationForest::new(ForestConfig { n_trees: 25, ..Default::default() }));
    let report = build_pipeline(dir.path(), extractor, factory).run();

    assert!(report.is_promoted(), "{:?}", report.outcome);
    assert_eq!(report.baseline_accuracy, 0.0);
    assert!(report.baseline_report.is_none());

    let deployed: BatchModelArtifact<IsolationForest> =
        ArtifactStore::new(dir.path().join("anomaly_model.json")).load().unwrap().unwrap();
    assert!(deployed.model.is_fitted());
    assert_eq!(deployed.training_size, 103);
    assert_eq!(FeedbackLog::new(dir.path().join("feedback.csv")).count().unwrap(), 0);
}
