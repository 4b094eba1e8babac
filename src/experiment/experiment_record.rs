//! Experiment Record - root entity for experiment tracking

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::ExperimentConfig;

/// Store-assigned identifier of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(i64);

impl ExperimentId {
    /// Wrap a raw row id.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw row id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for ExperimentId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for ExperimentId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self)
    }
}

/// Experiment Record represents one named training run with a fixed configuration.
///
/// This is the root entity in the tracking schema. Training metrics, evaluation
/// metrics and checkpoints all reference it by [`ExperimentId`].
///
/// `artifacts_path` is `None` only between the row insert and the one-time
/// assignment performed by [`crate::tracker::Tracker::start`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRecord {
    id: ExperimentId,
    name: String,
    created_at: DateTime<Utc>,
    config: ExperimentConfig,
    artifacts_path: Option<PathBuf>,
}

impl ExperimentRecord {
    /// Create a builder for constructing an experiment record with optional fields.
    #[must_use]
    pub fn builder(id: ExperimentId, name: impl Into<String>) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub const fn id(&self) -> ExperimentId {
        self.id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the experiment configuration.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Get the artifacts directory, once assigned.
    #[must_use]
    pub fn artifacts_path(&self) -> Option<&Path> {
        self.artifacts_path.as_deref()
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    id: ExperimentId,
    name: String,
    created_at: DateTime<Utc>,
    config: ExperimentConfig,
    artifacts_path: Option<PathBuf>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(id: ExperimentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            config: ExperimentConfig::default(),
            artifacts_path: None,
        }
    }

    /// Set the experiment configuration.
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set a custom creation timestamp (used when reading rows back).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the artifacts directory.
    #[must_use]
    pub fn artifacts_path(mut self, path: Option<PathBuf>) -> Self {
        self.artifacts_path = path;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            config: self.config,
            artifacts_path: self.artifacts_path,
        }
    }
}
