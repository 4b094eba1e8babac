//! # Trueno-Tracker: Embedded Experiment Tracking
//!
//! **Version**: 0.1.0
//!
//! Trueno-Tracker records machine-learning training runs into an embedded
//! `SQLite` store: one experiment per run with its configuration, per-epoch
//! training metrics, per-dataset evaluation scores and on-disk artifacts
//! such as model checkpoints. Stored runs are read back as Arrow tables and
//! served by a small read-only dashboard.
//!
//! ## Layers
//!
//! - [`experiment`]: records and the [`experiment::ExperimentStore`]
//! - [`tracker`]: the write side, with explicit handles or a current-experiment session
//! - [`artifact`]: checkpoint and artifact serialization (Parquet, JSON, custom)
//! - [`inspect`]: read-only tabular views
//! - `dashboard`: JSON and HTML routes (feature `server`)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_tracker::experiment::{EpochMetrics, ExperimentConfig, ExperimentStore};
//! use trueno_tracker::tracker::{Tracker, TrackingSession};
//!
//! let store = ExperimentStore::open("sqlite:///experiments.db")?;
//! let mut session = TrackingSession::new(Tracker::new(store, "./artifacts")?);
//!
//! session.start("default", ExperimentConfig::new().with_batch_size(64))?;
//! session.log_training_metrics(&EpochMetrics::new(1, 0.52, 0.84, 0.49, 0.86), None)?;
//! session.log_evaluation_metrics("test", 0.47, 0.87)?;
//! session.end();
//! # Ok::<(), trueno_tracker::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
#[cfg(feature = "server")]
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod experiment;
pub mod inspect;
pub mod settings;
pub mod tracker;

pub use error::{Error, Result};
