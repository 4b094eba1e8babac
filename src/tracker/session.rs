//! Tracking session bound to at most one current experiment

use std::path::PathBuf;

use tracing::info;

use super::{ExperimentHandle, Tracker};
use crate::artifact::Artifact;
use crate::experiment::{
    EpochMetrics, EvaluationMetricRecord, ExperimentConfig, ExperimentRecord,
    TrainingMetricRecord,
};
use crate::settings::TrackerSettings;
use crate::{Error, Result};

/// A [`Tracker`] plus a "current experiment" pointer.
///
/// Logging calls target the current experiment and fail with
/// [`Error::NoActiveExperiment`] when there is none. Not meant to be shared:
/// concurrent writers each open their own session over the same store.
#[derive(Debug)]
pub struct TrackingSession {
    tracker: Tracker,
    current: Option<ExperimentHandle>,
}

impl TrackingSession {
    /// Wrap a tracker. No experiment is current.
    #[must_use]
    pub const fn new(tracker: Tracker) -> Self {
        Self {
            tracker,
            current: None,
        }
    }

    /// Open a session from settings.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be opened or the artifacts root created.
    pub fn open(settings: &TrackerSettings) -> Result<Self> {
        Ok(Self::new(Tracker::from_settings(settings)?))
    }

    /// The wrapped tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The current experiment, if any.
    #[must_use]
    pub const fn current(&self) -> Option<&ExperimentHandle> {
        self.current.as_ref()
    }

    /// Start a new experiment and make it current. A previously current
    /// experiment is left untouched in the store.
    ///
    /// # Errors
    ///
    /// See [`Tracker::start`].
    pub fn start(&mut self, name: &str, config: ExperimentConfig) -> Result<ExperimentRecord> {
        let handle = self.tracker.start(name, config)?;
        let record = handle.record().clone();
        self.current = Some(handle);
        Ok(record)
    }

    /// Log one epoch against the current experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveExperiment` if no experiment is current,
    /// otherwise see [`Tracker::log_training_metrics`].
    pub fn log_training_metrics(
        &self,
        metrics: &EpochMetrics,
        checkpoint: Option<&Artifact>,
    ) -> Result<TrainingMetricRecord> {
        self.tracker
            .log_training_metrics(self.active()?, metrics, checkpoint)
    }

    /// Log an evaluation score against the current experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveExperiment` if no experiment is current,
    /// otherwise see [`Tracker::log_evaluation_metrics`].
    pub fn log_evaluation_metrics(
        &self,
        dataset_name: &str,
        loss: f64,
        accuracy: f64,
    ) -> Result<EvaluationMetricRecord> {
        self.tracker
            .log_evaluation_metrics(self.active()?, dataset_name, loss, accuracy)
    }

    /// Save an artifact into the current experiment's directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoActiveExperiment` if no experiment is current,
    /// otherwise see [`Tracker::save_artifact`].
    pub fn save_artifact(&self, artifact: &Artifact, filename: &str) -> Result<PathBuf> {
        self.tracker.save_artifact(self.active()?, artifact, filename)
    }

    /// Clear the current experiment. The store is not touched.
    pub fn end(&mut self) {
        if let Some(handle) = self.current.take() {
            info!(id = %handle.id(), "ended experiment");
        }
    }

    /// Give back the tracker.
    #[must_use]
    pub fn into_tracker(self) -> Tracker {
        self.tracker
    }

    fn active(&self) -> Result<&ExperimentHandle> {
        self.current.as_ref().ok_or(Error::NoActiveExperiment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ConfigValue, ExperimentStore};

    fn session() -> (tempfile::TempDir, TrackingSession) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(ExperimentStore::open_in_memory().unwrap(), dir.path()).unwrap();
        (dir, TrackingSession::new(tracker))
    }

    #[test]
    fn test_logging_requires_current_experiment() {
        let (_dir, session) = session();
        let metrics = EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7);

        assert!(matches!(
            session.log_training_metrics(&metrics, None),
            Err(Error::NoActiveExperiment)
        ));
        assert!(matches!(
            session.log_evaluation_metrics("test", 0.5, 0.8),
            Err(Error::NoActiveExperiment)
        ));
        assert!(matches!(
            session.save_artifact(&Artifact::Structured(ConfigValue::Null), "x.json"),
            Err(Error::NoActiveExperiment)
        ));
        assert_eq!(session.tracker().store().training_metric_count().unwrap(), 0);
    }

    #[test]
    fn test_end_clears_current() {
        let (_dir, mut session) = session();
        session.start("run", ExperimentConfig::new()).unwrap();
        assert!(session.current().is_some());

        session.end();
        assert!(session.current().is_none());
        assert!(matches!(
            session.log_evaluation_metrics("test", 0.5, 0.8),
            Err(Error::NoActiveExperiment)
        ));
        // Store untouched
        assert_eq!(session.tracker().store().experiment_count().unwrap(), 1);
    }

    #[test]
    fn test_restart_replaces_pointer_only() {
        let (_dir, mut session) = session();
        let first = session.start("first", ExperimentConfig::new()).unwrap();
        session
            .log_training_metrics(&EpochMetrics::new(1, 0.5, 0.8, 0.6, 0.7), None)
            .unwrap();

        let second = session.start("second", ExperimentConfig::new()).unwrap();
        assert_eq!(session.current().unwrap().id(), second.id());

        let store = session.tracker().store();
        assert_eq!(store.training_metrics(first.id()).unwrap().len(), 1);
        assert!(store.training_metrics(second.id()).unwrap().is_empty());
    }
}
