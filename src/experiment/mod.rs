//! Experiment Tracking Schema
//!
//! This module provides the persisted entities of the tracker and the
//! SQLite store that owns them.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< TrainingMetricRecord (N) [one per epoch]
//!        │                         │
//!        │                         └──< CheckpointRecord (0..1) [file on disk]
//!        └──< EvaluationMetricRecord (N) [one per logged dataset score]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use trueno_tracker::experiment::{EpochMetrics, ExperimentConfig, ExperimentStore};
//!
//! let store = ExperimentStore::open("sqlite://")?;
//!
//! let config = ExperimentConfig::new().with_learning_rate(0.01);
//! let experiment = store.insert_experiment("default", &config, Utc::now())?;
//!
//! let metrics = EpochMetrics::new(1, 0.52, 0.84, 0.48, 0.86);
//! store.insert_training_metric(experiment.id(), &metrics, Utc::now())?;
//!
//! assert_eq!(store.training_metrics(experiment.id())?.len(), 1);
//! # Ok::<(), trueno_tracker::Error>(())
//! ```

mod checkpoint_record;
mod config;
mod experiment_record;
mod metric_record;
mod store;

pub use checkpoint_record::CheckpointRecord;
pub use config::{ConfigValue, ExperimentConfig, RESERVED_KEYS};
pub use experiment_record::{ExperimentId, ExperimentRecord, ExperimentRecordBuilder};
pub(crate) use metric_record::ensure_finite;
pub use metric_record::{EpochMetrics, EvaluationMetricRecord, TrainingMetricRecord};
pub use store::{ExperimentStore, StoreTarget, DEFAULT_DATABASE_URL};
