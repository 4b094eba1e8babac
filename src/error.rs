//! Error types for Trueno-Tracker
//!
//! Three failure classes reach callers: precondition violations (logging without an
//! active experiment), not-found for write paths that name a missing experiment, and
//! store/serialization failures which are propagated unmodified.

use crate::experiment::ExperimentId;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Tracker error types
#[derive(Error, Debug)]
pub enum Error {
    /// A session logging call was made with no current experiment
    #[error("No active experiment. Call start() first.")]
    NoActiveExperiment,

    /// The named experiment does not exist in the store
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(ExperimentId),

    /// `artifacts_path` is assigned once per experiment
    #[error("Artifacts path already assigned for experiment {0}")]
    ArtifactsPathAlreadySet(ExperimentId),

    /// Invalid caller input (epoch, metric value, filename, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Relational store error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    /// True for the not-found class, which read surfaces map to a 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ExperimentNotFound(_))
    }
}
