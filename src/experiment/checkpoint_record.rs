//! Checkpoint Record - model state persisted at the end of an epoch

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExperimentId;

/// Checkpoint Record points at a file written for one training epoch.
///
/// The checkpoint is keyed by the training metric row it belongs to. The
/// epoch number is carried along for display only; it is unique per
/// experiment, not globally, so it never serves as a join key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointRecord {
    id: i64,
    experiment_id: ExperimentId,
    training_metric_id: i64,
    epoch: u32,
    path: PathBuf,
    created_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Assemble a record from a stored row.
    #[must_use]
    pub const fn new(
        id: i64,
        experiment_id: ExperimentId,
        training_metric_id: i64,
        epoch: u32,
        path: PathBuf,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            experiment_id,
            training_metric_id,
            epoch,
            path,
            created_at,
        }
    }

    /// Get the row ID.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub const fn experiment_id(&self) -> ExperimentId {
        self.experiment_id
    }

    /// Get the ID of the training metric row this checkpoint belongs to.
    #[must_use]
    pub const fn training_metric_id(&self) -> i64 {
        self.training_metric_id
    }

    /// Get the epoch number.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Get the checkpoint file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_record_new() {
        let record = CheckpointRecord::new(
            1,
            ExperimentId::new(3),
            9,
            4,
            PathBuf::from("artifacts/3/epoch_4.parquet"),
            Utc::now(),
        );
        assert_eq!(record.training_metric_id(), 9);
        assert_eq!(record.epoch(), 4);
        assert!(record.path().ends_with("epoch_4.parquet"));
    }
}
