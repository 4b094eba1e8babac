//! Experiment Store - SQLite-backed storage for experiment tracking data
//!
//! The store owns the schema and every SQL statement. Callers see typed
//! records only. Each write is a single statement; writes that must land
//! together run inside [`ExperimentStore::transaction`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{
    CheckpointRecord, EpochMetrics, EvaluationMetricRecord, ExperimentConfig, ExperimentId,
    ExperimentRecord, TrainingMetricRecord,
};
use crate::{Error, Result};

/// Default connection target: a file-backed store in the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///experiments.db";

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS experiments (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    name           TEXT    NOT NULL,
    start_time     TEXT    NOT NULL,
    config         TEXT    NOT NULL,
    artifacts_path TEXT
);

CREATE TABLE IF NOT EXISTS training_metrics (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    experiment_id  INTEGER NOT NULL REFERENCES experiments (id),
    epoch          INTEGER NOT NULL CHECK (epoch > 0),
    train_loss     REAL    NOT NULL,
    train_accuracy REAL    NOT NULL,
    val_loss       REAL    NOT NULL,
    val_accuracy   REAL    NOT NULL,
    timestamp      TEXT    NOT NULL,
    UNIQUE (experiment_id, epoch)
);

CREATE TABLE IF NOT EXISTS evaluation_metrics (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    experiment_id  INTEGER NOT NULL REFERENCES experiments (id),
    dataset_name   TEXT    NOT NULL,
    loss           REAL    NOT NULL,
    accuracy       REAL    NOT NULL,
    timestamp      TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluation_metrics_experiment
    ON evaluation_metrics (experiment_id, dataset_name);

CREATE TABLE IF NOT EXISTS checkpoints (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    experiment_id      INTEGER NOT NULL REFERENCES experiments (id),
    training_metric_id INTEGER NOT NULL UNIQUE REFERENCES training_metrics (id),
    epoch              INTEGER NOT NULL,
    path               TEXT    NOT NULL,
    created_at         TEXT    NOT NULL
);
";

/// Where the store lives, parsed from a connection string.
///
/// Accepts the `sqlite:///relative.db`, `sqlite:////absolute.db` and
/// `sqlite://` (in-memory) forms, `:memory:`, or a bare file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Private in-memory database, gone when the store is dropped.
    Memory,
    /// Database file.
    File(PathBuf),
}

impl StoreTarget {
    /// Parse a connection string.
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        if url == ":memory:" {
            return Self::Memory;
        }
        match url.strip_prefix("sqlite://") {
            Some(rest) => {
                // The third slash separates the (empty) authority from the path.
                let path = rest.strip_prefix('/').unwrap_or(rest);
                if path.is_empty() || path == ":memory:" {
                    Self::Memory
                } else {
                    Self::File(PathBuf::from(path))
                }
            }
            None => Self::File(PathBuf::from(url)),
        }
    }
}

/// SQLite store for experiments, metrics and checkpoints.
///
/// Opening a store always ensures the schema exists, so it is safe to point
/// at a fresh file or at one written by an earlier run.
#[derive(Debug)]
pub struct ExperimentStore {
    conn: Connection,
}

struct ExperimentRow {
    id: ExperimentId,
    name: String,
    start_time: DateTime<Utc>,
    config: String,
    artifacts_path: Option<String>,
}

impl ExperimentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            start_time: row.get(2)?,
            config: row.get(3)?,
            artifacts_path: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<ExperimentRecord> {
        let config = ExperimentConfig::from_json(serde_json::from_str(&self.config)?)?;
        Ok(ExperimentRecord::builder(self.id, self.name)
            .created_at(self.start_time)
            .config(config)
            .artifacts_path(self.artifacts_path.map(PathBuf::from))
            .build())
    }
}

const EXPERIMENT_COLUMNS: &str = "id, name, start_time, config, artifacts_path";

fn training_metric_from_row(row: &Row<'_>) -> rusqlite::Result<TrainingMetricRecord> {
    Ok(TrainingMetricRecord::new(
        row.get(0)?,
        row.get(1)?,
        EpochMetrics::new(row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
        row.get(7)?,
    ))
}

const TRAINING_METRIC_COLUMNS: &str =
    "id, experiment_id, epoch, train_loss, train_accuracy, val_loss, val_accuracy, timestamp";

fn evaluation_metric_from_row(row: &Row<'_>) -> rusqlite::Result<EvaluationMetricRecord> {
    Ok(EvaluationMetricRecord::new(
        row.get(0)?,
        row.get(1)?,
        row.get::<_, String>(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

const EVALUATION_METRIC_COLUMNS: &str =
    "id, experiment_id, dataset_name, loss, accuracy, timestamp";

fn checkpoint_from_row(row: &Row<'_>) -> rusqlite::Result<CheckpointRecord> {
    Ok(CheckpointRecord::new(
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        PathBuf::from(row.get::<_, String>(4)?),
        row.get(5)?,
    ))
}

impl ExperimentStore {
    /// Open the store named by a connection string and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the schema cannot be created.
    pub fn open(url: &str) -> Result<Self> {
        match StoreTarget::parse(url) {
            StoreTarget::Memory => Self::open_in_memory(),
            StoreTarget::File(path) => Self::open_path(path),
        }
    }

    /// Open a database file and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or the schema cannot be created.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened experiment store");
        Self::with_connection(conn)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns error if the pragma cannot be read.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    /// Create the tables if they do not exist yet. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if the schema version is newer than this build understands,
    /// or if a statement fails.
    pub fn init_schema(&self) -> Result<()> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(Error::InvalidInput(format!(
                "store schema version {current} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        self.conn.execute_batch(SCHEMA)?;
        if current < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        }
        Ok(())
    }

    /// Insert a new experiment. `artifacts_path` starts unset.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if an `extra` key shadows a typed option,
    /// or error if the config cannot be serialized or the insert fails.
    pub fn insert_experiment(
        &self,
        name: &str,
        config: &ExperimentConfig,
        created_at: DateTime<Utc>,
    ) -> Result<ExperimentRecord> {
        let config_json = serde_json::to_string(&config.to_json()?)?;
        self.conn.execute(
            "INSERT INTO experiments (name, start_time, config) VALUES (?1, ?2, ?3)",
            params![name, created_at, config_json],
        )?;
        let id = ExperimentId::new(self.conn.last_insert_rowid());
        debug!(%id, name, "inserted experiment");

        Ok(ExperimentRecord::builder(id, name)
            .created_at(created_at)
            .config(config.clone())
            .build())
    }

    /// Assign the artifacts directory. Allowed exactly once per experiment.
    ///
    /// # Errors
    ///
    /// Returns `Error::ArtifactsPathAlreadySet` on a second assignment and
    /// `Error::ExperimentNotFound` if the experiment does not exist.
    pub fn assign_artifacts_path(&self, id: ExperimentId, path: &Path) -> Result<()> {
        let changes = self.conn.execute(
            "UPDATE experiments SET artifacts_path = ?2
             WHERE id = ?1 AND artifacts_path IS NULL",
            params![id, path.to_string_lossy()],
        )?;
        if changes == 1 {
            return Ok(());
        }
        if self.experiment_exists(id)? {
            Err(Error::ArtifactsPathAlreadySet(id))
        } else {
            Err(Error::ExperimentNotFound(id))
        }
    }

    /// Check whether an experiment exists.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn experiment_exists(&self, id: ExperimentId) -> Result<bool> {
        Ok(self
            .conn
            .query_row("SELECT 1 FROM experiments WHERE id = ?1", [id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    /// Get an experiment by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or the stored config is corrupt.
    pub fn get_experiment(&self, id: ExperimentId) -> Result<Option<ExperimentRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments WHERE id = ?1"),
                [id],
                ExperimentRow::from_row,
            )
            .optional()?
            .map(ExperimentRow::into_record)
            .transpose()
    }

    /// All experiments in creation order.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails or a stored config is corrupt.
    pub fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut statement = self
            .conn
            .prepare(&format!("SELECT {EXPERIMENT_COLUMNS} FROM experiments ORDER BY id"))?;
        let rows = statement
            .query_map([], ExperimentRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(ExperimentRow::into_record).collect()
    }

    /// Number of experiments in the store.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn experiment_count(&self) -> Result<usize> {
        self.count("experiments")
    }

    /// Number of training metric rows across all experiments.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn training_metric_count(&self) -> Result<usize> {
        self.count("training_metrics")
    }

    /// Number of evaluation metric rows across all experiments.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn evaluation_metric_count(&self) -> Result<usize> {
        self.count("evaluation_metrics")
    }

    fn count(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Run `f` in one transaction, committed only if it returns `Ok`.
    ///
    /// Any error from `f` rolls back every write it made through the store.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or error if the transaction cannot be
    /// started or committed.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Append a training metric row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on a duplicate epoch for the same experiment
    /// (unique constraint) or an unknown experiment (foreign key).
    pub fn insert_training_metric(
        &self,
        experiment_id: ExperimentId,
        metrics: &EpochMetrics,
        timestamp: DateTime<Utc>,
    ) -> Result<TrainingMetricRecord> {
        self.conn.execute(
            "INSERT INTO training_metrics
                 (experiment_id, epoch, train_loss, train_accuracy, val_loss, val_accuracy, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                experiment_id,
                metrics.epoch,
                metrics.train_loss,
                metrics.train_accuracy,
                metrics.val_loss,
                metrics.val_accuracy,
                timestamp,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(%experiment_id, epoch = metrics.epoch, "inserted training metric");
        Ok(TrainingMetricRecord::new(id, experiment_id, *metrics, timestamp))
    }

    /// Training metric history for an experiment, ordered by ascending epoch.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn training_metrics(&self, experiment_id: ExperimentId) -> Result<Vec<TrainingMetricRecord>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {TRAINING_METRIC_COLUMNS} FROM training_metrics
             WHERE experiment_id = ?1 ORDER BY epoch, id"
        ))?;
        let rows = statement
            .query_map([experiment_id], training_metric_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The training metric with the highest epoch, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn latest_training_metric(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Option<TrainingMetricRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {TRAINING_METRIC_COLUMNS} FROM training_metrics
                     WHERE experiment_id = ?1 ORDER BY epoch DESC, id DESC LIMIT 1"
                ),
                [experiment_id],
                training_metric_from_row,
            )
            .optional()?)
    }

    /// Append an evaluation metric row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the experiment does not exist (foreign key)
    /// or the insert fails.
    pub fn insert_evaluation_metric(
        &self,
        experiment_id: ExperimentId,
        dataset_name: &str,
        loss: f64,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<EvaluationMetricRecord> {
        self.conn.execute(
            "INSERT INTO evaluation_metrics (experiment_id, dataset_name, loss, accuracy, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![experiment_id, dataset_name, loss, accuracy, timestamp],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(%experiment_id, dataset_name, "inserted evaluation metric");
        Ok(EvaluationMetricRecord::new(
            id,
            experiment_id,
            dataset_name,
            loss,
            accuracy,
            timestamp,
        ))
    }

    /// All evaluation metrics for an experiment in the order they were logged.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn evaluation_metrics(
        &self,
        experiment_id: ExperimentId,
    ) -> Result<Vec<EvaluationMetricRecord>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {EVALUATION_METRIC_COLUMNS} FROM evaluation_metrics
             WHERE experiment_id = ?1 ORDER BY id"
        ))?;
        let rows = statement
            .query_map([experiment_id], evaluation_metric_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Evaluation metrics for one dataset name, in the order they were logged.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn evaluation_metrics_for_dataset(
        &self,
        experiment_id: ExperimentId,
        dataset_name: &str,
    ) -> Result<Vec<EvaluationMetricRecord>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {EVALUATION_METRIC_COLUMNS} FROM evaluation_metrics
             WHERE experiment_id = ?1 AND dataset_name = ?2 ORDER BY id"
        ))?;
        let rows = statement
            .query_map(params![experiment_id, dataset_name], evaluation_metric_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Record a checkpoint file for a training metric row.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the metric already has a checkpoint or the insert fails.
    pub fn insert_checkpoint(
        &self,
        metric: &TrainingMetricRecord,
        path: &Path,
        created_at: DateTime<Utc>,
    ) -> Result<CheckpointRecord> {
        self.conn.execute(
            "INSERT INTO checkpoints (experiment_id, training_metric_id, epoch, path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                metric.experiment_id(),
                metric.id(),
                metric.epoch(),
                path.to_string_lossy(),
                created_at,
            ],
        )?;
        Ok(CheckpointRecord::new(
            self.conn.last_insert_rowid(),
            metric.experiment_id(),
            metric.id(),
            metric.epoch(),
            path.to_path_buf(),
            created_at,
        ))
    }

    /// Checkpoints for an experiment, ordered by epoch.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub fn checkpoints(&self, experiment_id: ExperimentId) -> Result<Vec<CheckpointRecord>> {
        let mut statement = self.conn.prepare(
            "SELECT id, experiment_id, training_metric_id, epoch, path, created_at
             FROM checkpoints WHERE experiment_id = ?1 ORDER BY epoch, id",
        )?;
        let rows = statement
            .query_map([experiment_id], checkpoint_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
