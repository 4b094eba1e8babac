//! End-to-end tracking tests: session -> store -> inspector, against a database file.

use std::path::Path;

use trueno_tracker::artifact::{Artifact, SaveArtifact, Tensor, TensorState};
use trueno_tracker::experiment::{ConfigValue, EpochMetrics, ExperimentConfig, ExperimentStore};
use trueno_tracker::inspect::Inspector;
use trueno_tracker::settings::TrackerSettings;
use trueno_tracker::tracker::{Tracker, TrackingSession};
use trueno_tracker::Error;

fn settings(dir: &tempfile::TempDir) -> TrackerSettings {
    TrackerSettings {
        database_url: format!("sqlite:///{}", dir.path().join("experiments.db").display()),
        artifacts_dir: dir.path().join("artifacts"),
        ..TrackerSettings::default()
    }
}

#[test]
fn test_start_persists_config_and_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();

    let record = session
        .start("default", ExperimentConfig::new().with_extra("lr", 0.01).unwrap())
        .unwrap();

    let artifacts = record.artifacts_path().unwrap();
    assert!(artifacts.is_dir());
    assert!(artifacts.starts_with(dir.path().join("artifacts")));

    // A second connection sees the same row
    let store = ExperimentStore::open(&settings(&dir).database_url).unwrap();
    let stored = store.get_experiment(record.id()).unwrap().unwrap();
    assert_eq!(stored.name(), "default");
    let config = stored.config().to_json().unwrap();
    assert_eq!(config["lr"], 0.01);
    assert!(config["max_samples"].is_null());
    assert_eq!(stored.artifacts_path(), Some(artifacts));
}

#[test]
fn test_logging_without_experiment_inserts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let session = TrackingSession::open(&settings(&dir)).unwrap();

    let err = session
        .log_training_metrics(&EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7), None)
        .unwrap_err();
    assert!(matches!(err, Error::NoActiveExperiment));

    let store = session.tracker().store();
    assert_eq!(store.training_metric_count().unwrap(), 0);
    assert_eq!(store.evaluation_metric_count().unwrap(), 0);
}

#[test]
fn test_five_epochs_read_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("curves", ExperimentConfig::new()).unwrap();

    let logged: Vec<EpochMetrics> = (1..=5)
        .map(|epoch| {
            let e = f64::from(epoch);
            EpochMetrics::new(epoch, 1.0 / e, 0.5 + e / 20.0, 1.1 / e, 0.45 + e / 20.0)
        })
        .collect();
    for metrics in &logged {
        session.log_training_metrics(metrics, None).unwrap();
    }

    let stored = session.tracker().store().training_metrics(record.id()).unwrap();
    let read_back: Vec<EpochMetrics> = stored.iter().map(|m| m.metrics()).collect();
    assert_eq!(read_back, logged);
}

#[test]
fn test_checkpoint_per_epoch_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("ckpt", ExperimentConfig::new()).unwrap();

    let state = TensorState::new()
        .with("fc1.weight", Tensor::new(vec![2, 3], vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap())
        .with("fc1.bias", Tensor::new(vec![2], vec![0.0, -1.0]).unwrap());
    let artifact = Artifact::from(state.clone());

    for epoch in 1..=2 {
        session
            .log_training_metrics(&EpochMetrics::new(epoch, 0.5, 0.8, 0.6, 0.7), Some(&artifact))
            .unwrap();
    }

    let checkpoints = session.tracker().store().checkpoints(record.id()).unwrap();
    assert_eq!(checkpoints.len(), 2);
    let artifacts = record.artifacts_path().unwrap();
    assert_eq!(checkpoints[1].path(), artifacts.join("epoch_2.parquet"));
    assert_eq!(TensorState::load(checkpoints[1].path()).unwrap(), state);
}

#[test]
fn test_duplicate_epoch_writes_no_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("dup", ExperimentConfig::new()).unwrap();
    let metrics = EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7);

    session.log_training_metrics(&metrics, None).unwrap();
    let artifact = Artifact::Structured(ConfigValue::from("weights"));
    assert!(session.log_training_metrics(&metrics, Some(&artifact)).is_err());

    assert!(!record.artifacts_path().unwrap().join("epoch_1.json").exists());
    assert!(session.tracker().store().checkpoints(record.id()).unwrap().is_empty());
}

#[test]
fn test_evaluations_keep_every_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("eval", ExperimentConfig::new()).unwrap();

    session.log_evaluation_metrics("test", 0.31, 0.91).unwrap();
    session.log_evaluation_metrics("test_blurred", 0.82, 0.71).unwrap();
    session.log_evaluation_metrics("test", 0.29, 0.92).unwrap();

    let store = session.tracker().store();
    assert_eq!(store.evaluation_metrics(record.id()).unwrap().len(), 3);

    let blurred = store
        .evaluation_metrics_for_dataset(record.id(), "test_blurred")
        .unwrap();
    assert_eq!(blurred.len(), 1);
    assert_eq!(blurred[0].loss(), 0.82);
    assert_eq!(blurred[0].accuracy(), 0.71);

    let pivot = Inspector::new(store).evaluation_metrics(record.id()).unwrap().unwrap();
    assert_eq!(pivot.num_rows(), 2);
}

#[test]
fn test_invalid_metrics_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    session.start("bad", ExperimentConfig::new()).unwrap();

    assert!(matches!(
        session.log_training_metrics(&EpochMetrics::new(0, 0.5, 0.8, 0.6, 0.7), None),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.log_training_metrics(&EpochMetrics::new(1, f64::NAN, 0.8, 0.6, 0.7), None),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.log_evaluation_metrics("", 0.5, 0.8),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        session.log_evaluation_metrics("test", 0.5, f64::INFINITY),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(session.tracker().store().training_metric_count().unwrap(), 0);
}

#[test]
fn test_structured_artifact_stringifies_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    session.start("artifact", ExperimentConfig::new()).unwrap();

    let value = ConfigValue::from(vec![
        ConfigValue::from(Path::new("root/mnist_test.pt")),
        ConfigValue::from(1.5),
    ]);
    let path = session
        .save_artifact(&Artifact::Structured(value), "inputs.json")
        .unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(written, serde_json::json!(["root/mnist_test.pt", 1.5]));
}

struct Notes(&'static str);

impl SaveArtifact for Notes {
    fn save(&self, path: &Path) -> trueno_tracker::Result<()> {
        std::fs::write(path, self.0)?;
        Ok(())
    }

    fn extension(&self) -> &str {
        "txt"
    }
}

#[test]
fn test_custom_artifact_as_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("custom", ExperimentConfig::new()).unwrap();

    session
        .log_training_metrics(
            &EpochMetrics::new(4, 0.5, 0.8, 0.6, 0.7),
            Some(&Artifact::custom(Notes("epoch four"))),
        )
        .unwrap();

    let path = record.artifacts_path().unwrap().join("epoch_4.txt");
    assert_eq!(std::fs::read_to_string(path).unwrap(), "epoch four");
}

/// Fails after creating its file.
struct FullDisk;

impl SaveArtifact for FullDisk {
    fn save(&self, path: &Path) -> trueno_tracker::Result<()> {
        std::fs::write(path, "trunc")?;
        Err(Error::InvalidInput("disk full".to_string()))
    }

    fn extension(&self) -> &str {
        "txt"
    }
}

#[test]
fn test_failed_checkpoint_can_be_retried() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = TrackingSession::open(&settings(&dir)).unwrap();
    let record = session.start("retry", ExperimentConfig::new()).unwrap();
    let metrics = EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7);

    let err = session
        .log_training_metrics(&metrics, Some(&Artifact::custom(FullDisk)))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let store = ExperimentStore::open(&settings(&dir).database_url).unwrap();
    assert_eq!(store.training_metric_count().unwrap(), 0);
    let path = record.artifacts_path().unwrap().join("epoch_1.txt");
    assert!(!path.exists());

    session
        .log_training_metrics(&metrics, Some(&Artifact::custom(Notes("epoch one"))))
        .unwrap();
    assert_eq!(store.training_metric_count().unwrap(), 1);
    assert_eq!(store.checkpoints(record.id()).unwrap().len(), 1);
    assert_eq!(std::fs::read_to_string(path).unwrap(), "epoch one");
}

#[test]
fn test_explicit_handles_log_to_two_experiments() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = Tracker::from_settings(&settings(&dir)).unwrap();

    let a = tracker.start("a", ExperimentConfig::new()).unwrap();
    let b = tracker.start("b", ExperimentConfig::new()).unwrap();
    tracker
        .log_training_metrics(&a, &EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7), None)
        .unwrap();
    tracker.log_evaluation_metrics(&b, "test", 0.4, 0.9).unwrap();

    let store = tracker.store();
    assert_eq!(store.training_metrics(a.id()).unwrap().len(), 1);
    assert!(store.training_metrics(b.id()).unwrap().is_empty());
    assert_eq!(store.evaluation_metrics(b.id()).unwrap().len(), 1);
}

#[test]
fn test_details_for_unknown_experiment() {
    let dir = tempfile::tempdir().unwrap();
    let session = TrackingSession::open(&settings(&dir)).unwrap();
    let store = session.tracker().store();
    let missing = trueno_tracker::experiment::ExperimentId::new(404);

    assert!(Inspector::new(store).experiment_details(missing).unwrap().is_none());
    assert!(session.tracker().handle_for(missing).unwrap_err().is_not_found());
}
