//! Metric Records - per-epoch training metrics and per-dataset evaluation metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExperimentId;
use crate::{Error, Result};

/// The values logged at the end of one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// One-based epoch number.
    pub epoch: u32,
    /// Mean loss over the training split.
    pub train_loss: f64,
    /// Accuracy over the training split.
    pub train_accuracy: f64,
    /// Mean loss over the validation split.
    pub val_loss: f64,
    /// Accuracy over the validation split.
    pub val_accuracy: f64,
}

impl EpochMetrics {
    /// Bundle the values of one epoch.
    #[must_use]
    pub const fn new(
        epoch: u32,
        train_loss: f64,
        train_accuracy: f64,
        val_loss: f64,
        val_accuracy: f64,
    ) -> Self {
        Self {
            epoch,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
        }
    }

    /// Check the epoch is positive and every value is finite.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.epoch == 0 {
            return Err(Error::InvalidInput("epoch must be positive".to_string()));
        }
        let values = [
            ("train_loss", self.train_loss),
            ("train_accuracy", self.train_accuracy),
            ("val_loss", self.val_loss),
            ("val_accuracy", self.val_accuracy),
        ];
        ensure_finite(&values)
    }
}

pub(crate) fn ensure_finite(values: &[(&str, f64)]) -> Result<()> {
    for (name, value) in values {
        if !value.is_finite() {
            return Err(Error::InvalidInput(format!("{name} must be finite, got {value}")));
        }
    }
    Ok(())
}

/// Training Metric Record: one row per (experiment, epoch).
///
/// Rows are append-only. Epochs are unique within an experiment and are
/// returned in ascending order by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetricRecord {
    id: i64,
    experiment_id: ExperimentId,
    epoch: u32,
    train_loss: f64,
    train_accuracy: f64,
    val_loss: f64,
    val_accuracy: f64,
    timestamp: DateTime<Utc>,
}

impl TrainingMetricRecord {
    /// Assemble a record from a stored row.
    #[must_use]
    pub const fn new(
        id: i64,
        experiment_id: ExperimentId,
        metrics: EpochMetrics,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            experiment_id,
            epoch: metrics.epoch,
            train_loss: metrics.train_loss,
            train_accuracy: metrics.train_accuracy,
            val_loss: metrics.val_loss,
            val_accuracy: metrics.val_accuracy,
            timestamp,
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

    /// Get the epoch number.
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Get the training loss.
    #[must_use]
    pub const fn train_loss(&self) -> f64 {
        self.train_loss
    }

    /// Get the training accuracy.
    #[must_use]
    pub const fn train_accuracy(&self) -> f64 {
        self.train_accuracy
    }

    /// Get the validation loss.
    #[must_use]
    pub const fn val_loss(&self) -> f64 {
        self.val_loss
    }

    /// Get the validation accuracy.
    #[must_use]
    pub const fn val_accuracy(&self) -> f64 {
        self.val_accuracy
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The logged values without row metadata.
    #[must_use]
    pub const fn metrics(&self) -> EpochMetrics {
        EpochMetrics::new(
            self.epoch,
            self.train_loss,
            self.train_accuracy,
            self.val_loss,
            self.val_accuracy,
        )
    }
}

/// Evaluation Metric Record: a score on one held-out dataset.
///
/// Several rows may share a dataset name; none overwrites another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationMetricRecord {
    id: i64,
    experiment_id: ExperimentId,
    dataset_name: String,
    loss: f64,
    accuracy: f64,
    timestamp: DateTime<Utc>,
}

impl EvaluationMetricRecord {
    /// Assemble a record from a stored row.
    #[must_use]
    pub fn new(
        id: i64,
        experiment_id: ExperimentId,
        dataset_name: impl Into<String>,
        loss: f64,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            experiment_id,
            dataset_name: dataset_name.into(),
            loss,
            accuracy,
            timestamp,
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

    /// Get the dataset name (e.g. "test", "test_blurred").
    #[must_use]
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Get the loss.
    #[must_use]
    pub const fn loss(&self) -> f64 {
        self.loss
    }

    /// Get the accuracy.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
