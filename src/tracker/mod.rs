//! Tracking - writes experiments, metrics and artifacts
//!
//! [`Tracker`] takes the target experiment as an explicit
//! [`ExperimentHandle`] on every call. [`TrackingSession`] layers the
//! "current experiment" pointer on top for scripts that log one run at a time.
//!
//! ```rust,no_run
//! use trueno_tracker::experiment::{EpochMetrics, ExperimentConfig, ExperimentStore};
//! use trueno_tracker::tracker::Tracker;
//!
//! let tracker = Tracker::new(ExperimentStore::open("sqlite:///experiments.db")?, "./artifacts")?;
//! let run = tracker.start("default", ExperimentConfig::new().with_learning_rate(0.01))?;
//!
//! for epoch in 1..=3 {
//!     let metrics = EpochMetrics::new(epoch, 0.5, 0.8, 0.55, 0.78);
//!     tracker.log_training_metrics(&run, &metrics, None)?;
//! }
//! tracker.log_evaluation_metrics(&run, "test", 0.57, 0.77)?;
//! # Ok::<(), trueno_tracker::Error>(())
//! ```

mod session;

pub use session::TrackingSession;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::experiment::{
    ensure_finite, EpochMetrics, EvaluationMetricRecord, ExperimentConfig, ExperimentId,
    ExperimentRecord, ExperimentStore, TrainingMetricRecord,
};
use crate::settings::TrackerSettings;
use crate::{Error, Result};

/// A started experiment: its record plus the directory its artifacts go to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentHandle {
    record: ExperimentRecord,
    artifacts_dir: PathBuf,
}

impl ExperimentHandle {
    /// The experiment ID.
    #[must_use]
    pub const fn id(&self) -> ExperimentId {
        self.record.id()
    }

    /// The experiment as stored.
    #[must_use]
    pub const fn record(&self) -> &ExperimentRecord {
        &self.record
    }

    /// Directory for this experiment's artifacts.
    #[must_use]
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }
}

/// Mediates every write into the store and every artifact placed on disk.
#[derive(Debug)]
pub struct Tracker {
    store: ExperimentStore,
    artifacts_root: PathBuf,
}

impl Tracker {
    /// Create a tracker over an open store. The artifacts root is created if absent.
    ///
    /// # Errors
    ///
    /// Returns error if the artifacts root cannot be created.
    pub fn new(store: ExperimentStore, artifacts_root: impl Into<PathBuf>) -> Result<Self> {
        let artifacts_root = artifacts_root.into();
        fs::create_dir_all(&artifacts_root)?;
        Ok(Self {
            store,
            artifacts_root,
        })
    }

    /// Open the store and artifacts root named by the settings.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the root cannot be created.
    pub fn from_settings(settings: &TrackerSettings) -> Result<Self> {
        Self::new(
            ExperimentStore::open(&settings.database_url)?,
            &settings.artifacts_dir,
        )
    }

    /// The underlying store, for reads.
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// Root directory of all experiment directories.
    #[must_use]
    pub fn artifacts_root(&self) -> &Path {
        &self.artifacts_root
    }

    /// Start a new experiment.
    ///
    /// Inserts the row, creates `<artifacts_root>/<id>` and records that
    /// directory as the experiment's `artifacts_path`. Earlier experiments are
    /// not affected.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty name or a config whose
    /// `extra` bag shadows a typed option, or a store/IO error.
    pub fn start(&self, name: &str, config: ExperimentConfig) -> Result<ExperimentHandle> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("experiment name must not be empty".to_string()));
        }
        let record = self.store.insert_experiment(name, &config, Utc::now())?;
        let handle = self.attach_artifacts_dir(record)?;
        info!(
            id = %handle.id(),
            name,
            artifacts = %handle.artifacts_dir.display(),
            "started experiment"
        );
        Ok(handle)
    }

    /// Handle for an experiment that already exists, e.g. to resume logging.
    ///
    /// An experiment whose directory was never assigned (interrupted start)
    /// gets it assigned now.
    ///
    /// # Errors
    ///
    /// Returns `Error::ExperimentNotFound` if no such experiment exists.
    pub fn handle_for(&self, id: ExperimentId) -> Result<ExperimentHandle> {
        let record = self
            .store
            .get_experiment(id)?
            .ok_or(Error::ExperimentNotFound(id))?;

        match record.artifacts_path().map(Path::to_path_buf) {
            Some(artifacts_dir) => Ok(ExperimentHandle {
                record,
                artifacts_dir,
            }),
            None => self.attach_artifacts_dir(record),
        }
    }

    fn attach_artifacts_dir(&self, record: ExperimentRecord) -> Result<ExperimentHandle> {
        let artifacts_dir = self.artifacts_root.join(record.id().to_string());
        fs::create_dir_all(&artifacts_dir)?;
        self.store.assign_artifacts_path(record.id(), &artifacts_dir)?;

        let record = ExperimentRecord::builder(record.id(), record.name())
            .created_at(record.created_at())
            .config(record.config().clone())
            .artifacts_path(Some(artifacts_dir.clone()))
            .build();
        Ok(ExperimentHandle {
            record,
            artifacts_dir,
        })
    }

    /// Log the metrics of one epoch, optionally with a checkpoint.
    ///
    /// The checkpoint is written to `epoch_<N>.<ext>` in the experiment's
    /// directory and recorded against the new metric row. The metric row,
    /// the file and the checkpoint row land together: if the checkpoint
    /// cannot be saved, nothing is stored and the epoch can be logged again.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a zero epoch or a non-finite value,
    /// `Error::Database` if the epoch was already logged for this experiment,
    /// or an IO/serialization error from writing the checkpoint.
    pub fn log_training_metrics(
        &self,
        experiment: &ExperimentHandle,
        metrics: &EpochMetrics,
        checkpoint: Option<&Artifact>,
    ) -> Result<TrainingMetricRecord> {
        metrics.validate()?;
        self.store.transaction(|store| {
            let record = store.insert_training_metric(experiment.id(), metrics, Utc::now())?;

            if let Some(artifact) = checkpoint {
                let path = experiment
                    .artifacts_dir
                    .join(format!("epoch_{}.{}", metrics.epoch, artifact.extension()));
                let saved = artifact
                    .write_to(&path)
                    .and_then(|()| store.insert_checkpoint(&record, &path, Utc::now()));
                if let Err(err) = saved {
                    remove_partial(&path);
                    return Err(err);
                }
                debug!(
                    id = %experiment.id(),
                    epoch = metrics.epoch,
                    path = %path.display(),
                    "saved checkpoint"
                );
            }

            Ok(record)
        })
    }

    /// Log a score on a held-out dataset. Repeated dataset names add rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an empty dataset name or a non-finite
    /// value, or a store error.
    pub fn log_evaluation_metrics(
        &self,
        experiment: &ExperimentHandle,
        dataset_name: &str,
        loss: f64,
        accuracy: f64,
    ) -> Result<EvaluationMetricRecord> {
        if dataset_name.is_empty() {
            return Err(Error::InvalidInput("dataset name must not be empty".to_string()));
        }
        ensure_finite(&[("loss", loss), ("accuracy", accuracy)])?;
        self.store
            .insert_evaluation_metric(experiment.id(), dataset_name, loss, accuracy, Utc::now())
    }

    /// Write an artifact into the experiment's directory and return its path.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `filename` is not a plain file name,
    /// or an IO/serialization error.
    pub fn save_artifact(
        &self,
        experiment: &ExperimentHandle,
        artifact: &Artifact,
        filename: &str,
    ) -> Result<PathBuf> {
        if Path::new(filename).file_name().and_then(|f| f.to_str()) != Some(filename) {
            return Err(Error::InvalidInput(format!(
                "artifact filename must be a plain file name, got {filename:?}"
            )));
        }
        let path = experiment.artifacts_dir.join(filename);
        artifact.write_to(&path)?;
        debug!(id = %experiment.id(), path = %path.display(), ?artifact, "saved artifact");
        Ok(path)
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial checkpoint"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), %err, "could not remove partial checkpoint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{SaveArtifact, Tensor, TensorState};
    use crate::experiment::ConfigValue;

    fn tracker() -> (tempfile::TempDir, Tracker) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(
            ExperimentStore::open_in_memory().unwrap(),
            dir.path().join("artifacts"),
        )
        .unwrap();
        (dir, tracker)
    }

    #[test]
    fn test_start_creates_directory_named_by_id() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("default", ExperimentConfig::new()).unwrap();

        assert!(run.artifacts_dir().is_dir());
        assert_eq!(
            run.artifacts_dir(),
            tracker.artifacts_root().join(run.id().to_string())
        );
        assert_eq!(run.record().artifacts_path(), Some(run.artifacts_dir()));
    }

    #[test]
    fn test_same_name_does_not_collide() {
        let (_dir, tracker) = tracker();
        let a = tracker.start("same", ExperimentConfig::new()).unwrap();
        let b = tracker.start("same", ExperimentConfig::new()).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.artifacts_dir(), b.artifacts_dir());
    }

    #[test]
    fn test_empty_name_rejected() {
        let (_dir, tracker) = tracker();
        assert!(matches!(
            tracker.start("  ", ExperimentConfig::new()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_checkpoint_written_per_epoch() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("ckpt", ExperimentConfig::new()).unwrap();
        let state = TensorState::new().with("w", Tensor::new(vec![2], vec![1.0, 2.0]).unwrap());
        let artifact = Artifact::from(state.clone());

        let metric = tracker
            .log_training_metrics(&run, &EpochMetrics::new(3, 0.1, 0.9, 0.2, 0.85), Some(&artifact))
            .unwrap();

        let checkpoints = tracker.store().checkpoints(run.id()).unwrap();
        assert_eq!(checkpoints.len(), 1);
        assert_eq!(checkpoints[0].training_metric_id(), metric.id());
        assert_eq!(checkpoints[0].path(), run.artifacts_dir().join("epoch_3.parquet"));
        assert_eq!(TensorState::load(checkpoints[0].path()).unwrap(), state);
    }

    /// Writes half a file, then fails.
    struct DiskFull;

    impl SaveArtifact for DiskFull {
        fn save(&self, path: &Path) -> Result<()> {
            fs::write(path, b"partial")?;
            Err(Error::InvalidInput("disk full".to_string()))
        }

        fn extension(&self) -> &str {
            "bin"
        }
    }

    #[test]
    fn test_failed_checkpoint_leaves_epoch_unlogged() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("ckpt", ExperimentConfig::new()).unwrap();
        let metrics = EpochMetrics::new(1, 0.1, 0.9, 0.2, 0.85);

        let err = tracker
            .log_training_metrics(&run, &metrics, Some(&Artifact::custom(DiskFull)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(tracker.store().training_metric_count().unwrap(), 0);
        assert!(tracker.store().checkpoints(run.id()).unwrap().is_empty());
        assert!(!run.artifacts_dir().join("epoch_1.bin").exists());

        // Same epoch again, now with a checkpoint that saves
        let state = TensorState::new().with("w", Tensor::new(vec![1], vec![0.5]).unwrap());
        tracker
            .log_training_metrics(&run, &metrics, Some(&Artifact::from(state)))
            .unwrap();
        assert_eq!(tracker.store().training_metric_count().unwrap(), 1);
        assert_eq!(tracker.store().checkpoints(run.id()).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_epoch_keeps_existing_checkpoint() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("ckpt", ExperimentConfig::new()).unwrap();
        let metrics = EpochMetrics::new(2, 0.1, 0.9, 0.2, 0.85);
        let state = TensorState::new().with("w", Tensor::new(vec![1], vec![0.5]).unwrap());
        let artifact = Artifact::from(state.clone());

        tracker.log_training_metrics(&run, &metrics, Some(&artifact)).unwrap();
        let err = tracker
            .log_training_metrics(&run, &metrics, Some(&artifact))
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));

        let path = run.artifacts_dir().join("epoch_2.parquet");
        assert_eq!(TensorState::load(&path).unwrap(), state);
        assert_eq!(tracker.store().checkpoints(run.id()).unwrap().len(), 1);
    }

    #[test]
    fn test_start_rejects_config_shadowing_typed_option() {
        let (_dir, tracker) = tracker();
        let mut config = ExperimentConfig::new();
        config
            .extra
            .insert("max_epochs".to_string(), serde_json::json!("ten"));

        assert!(matches!(
            tracker.start("x", config),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(tracker.store().experiment_count().unwrap(), 0);
        assert!(tracker.store().list_experiments().unwrap().is_empty());
    }

    #[test]
    fn test_save_artifact_rejects_nested_paths() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("x", ExperimentConfig::new()).unwrap();
        let artifact = Artifact::Structured(ConfigValue::Null);

        for bad in ["../escape.json", "sub/dir.json", ""] {
            assert!(matches!(
                tracker.save_artifact(&run, &artifact, bad),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_handle_for_unknown_experiment() {
        let (_dir, tracker) = tracker();
        let err = tracker.handle_for(ExperimentId::new(404)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_handle_for_existing_experiment() {
        let (_dir, tracker) = tracker();
        let run = tracker.start("resume", ExperimentConfig::new()).unwrap();
        let again = tracker.handle_for(run.id()).unwrap();
        assert_eq!(again.artifacts_dir(), run.artifacts_dir());
    }
}
