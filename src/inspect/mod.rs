//! Inspector - read-only tabular views over the experiment store
//!
//! Every view is an Arrow [`RecordBatch`] so it can be pretty-printed,
//! rendered to HTML or handed to any Arrow consumer. Per-experiment views
//! return `Ok(None)` for an unknown experiment and an empty table when the
//! experiment has nothing logged yet.

mod details;

pub use details::ExperimentDetails;

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array};
use arrow::datatypes::Schema;

use crate::experiment::{ExperimentId, ExperimentRecord, ExperimentStore, TrainingMetricRecord};
use crate::Result;

/// Column names shared by the views and the dashboard.
pub mod columns {
    /// Experiment ID.
    pub const ID: &str = "ID";
    /// Experiment name.
    pub const NAME: &str = "Name";
    /// Experiment start time.
    pub const START_TIME: &str = "Start Time";
    /// Epoch number.
    pub const EPOCH: &str = "Epoch";
    /// Training loss.
    pub const TRAIN_LOSS: &str = "Train Loss";
    /// Training accuracy.
    pub const TRAIN_ACC: &str = "Train Acc";
    /// Validation loss.
    pub const VAL_LOSS: &str = "Val Loss";
    /// Validation accuracy.
    pub const VAL_ACC: &str = "Val Acc";
    /// Wall-clock time of a metric.
    pub const TIMESTAMP: &str = "Timestamp";
    /// Evaluation dataset name.
    pub const DATASET: &str = "Dataset";
    /// Evaluation loss.
    pub const LOSS: &str = "Loss";
    /// Evaluation accuracy.
    pub const ACC: &str = "Acc";
}

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const METRIC_TIME_FORMAT: &str = "%H:%M:%S";

/// Read-only projections from the store into tables.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    store: &'a ExperimentStore,
}

impl<'a> Inspector<'a> {
    /// Create an inspector over a store.
    #[must_use]
    pub const fn new(store: &'a ExperimentStore) -> Self {
        Self { store }
    }

    /// One row per experiment: ID, name, start time, then one text column per
    /// configuration key seen in any experiment (sorted by key, empty where unset).
    /// A key that matches a fixed column is shown as `config.<key>`.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn list_experiments(&self) -> Result<RecordBatch> {
        let experiments = self.store.list_experiments()?;
        let configs = experiments
            .iter()
            .map(config_object)
            .collect::<Result<Vec<_>>>()?;

        let keys: BTreeSet<&String> = configs.iter().flat_map(serde_json::Map::keys).collect();

        let mut columns: Vec<(String, ArrayRef)> = vec![
            (
                columns::ID.to_string(),
                Arc::new(Int64Array::from_iter_values(
                    experiments.iter().map(|e| e.id().get()),
                )) as ArrayRef,
            ),
            (
                columns::NAME.to_string(),
                Arc::new(StringArray::from_iter_values(
                    experiments.iter().map(ExperimentRecord::name),
                )) as ArrayRef,
            ),
            (
                columns::START_TIME.to_string(),
                Arc::new(StringArray::from_iter_values(
                    experiments.iter().map(start_time_text),
                )) as ArrayRef,
            ),
        ];
        let mut taken: BTreeSet<String> = keys.iter().map(|k| (*k).clone()).collect();
        for key in keys {
            let cells: StringArray = configs
                .iter()
                .map(|config| config.get(key.as_str()).and_then(value_text))
                .collect();
            let name = config_column_name(key, &mut taken);
            columns.push((name, Arc::new(cells) as ArrayRef));
        }

        Ok(RecordBatch::try_from_iter(columns)?)
    }

    /// Single-row table with the experiment's ID, name and start time.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn properties(&self, id: ExperimentId) -> Result<Option<RecordBatch>> {
        let Some(experiment) = self.store.get_experiment(id)? else {
            return Ok(None);
        };
        let columns: Vec<(&str, ArrayRef)> = vec![
            (
                columns::ID,
                Arc::new(Int64Array::from(vec![experiment.id().get()])) as ArrayRef,
            ),
            (
                columns::NAME,
                Arc::new(StringArray::from(vec![experiment.name()])) as ArrayRef,
            ),
            (
                columns::START_TIME,
                Arc::new(StringArray::from(vec![start_time_text(&experiment)])) as ArrayRef,
            ),
        ];
        Ok(Some(RecordBatch::try_from_iter(columns)?))
    }

    /// Single-row table with one text column per configuration key.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn parameters(&self, id: ExperimentId) -> Result<Option<RecordBatch>> {
        let Some(experiment) = self.store.get_experiment(id)? else {
            return Ok(None);
        };
        let config = config_object(&experiment)?;
        if config.is_empty() {
            return Ok(Some(RecordBatch::new_empty(Arc::new(Schema::empty()))));
        }

        let columns: Vec<(&String, ArrayRef)> = config
            .iter()
            .map(|(key, value)| {
                let cell: StringArray = std::iter::once(value_text(value)).collect();
                (key, Arc::new(cell) as ArrayRef)
            })
            .collect();
        Ok(Some(RecordBatch::try_from_iter(columns)?))
    }

    /// Training history ordered by epoch.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn training_metrics(&self, id: ExperimentId) -> Result<Option<RecordBatch>> {
        if !self.store.experiment_exists(id)? {
            return Ok(None);
        }
        let metrics = self.store.training_metrics(id)?;

        let float_column = |f: fn(&TrainingMetricRecord) -> f64| -> ArrayRef {
            Arc::new(Float64Array::from_iter_values(metrics.iter().map(f)))
        };
        let columns: Vec<(&str, ArrayRef)> = vec![
            (
                columns::EPOCH,
                Arc::new(UInt32Array::from_iter_values(
                    metrics.iter().map(TrainingMetricRecord::epoch),
                )) as ArrayRef,
            ),
            (columns::TRAIN_LOSS, float_column(TrainingMetricRecord::train_loss)),
            (columns::TRAIN_ACC, float_column(TrainingMetricRecord::train_accuracy)),
            (columns::VAL_LOSS, float_column(TrainingMetricRecord::val_loss)),
            (columns::VAL_ACC, float_column(TrainingMetricRecord::val_accuracy)),
            (
                columns::TIMESTAMP,
                Arc::new(StringArray::from_iter_values(
                    metrics
                        .iter()
                        .map(|m| m.timestamp().format(METRIC_TIME_FORMAT).to_string()),
                )) as ArrayRef,
            ),
        ];
        Ok(Some(RecordBatch::try_from_iter(columns)?))
    }

    /// Evaluation results pivoted by dataset name.
    ///
    /// One row per dataset in order of first appearance. When a dataset was
    /// scored more than once, the latest score is shown; all rows remain in
    /// the store.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn evaluation_metrics(&self, id: ExperimentId) -> Result<Option<RecordBatch>> {
        if !self.store.experiment_exists(id)? {
            return Ok(None);
        }

        let mut pivot: Vec<(String, f64, f64)> = Vec::new();
        for metric in self.store.evaluation_metrics(id)? {
            match pivot.iter_mut().find(|(name, _, _)| name == metric.dataset_name()) {
                Some(row) => {
                    row.1 = metric.loss();
                    row.2 = metric.accuracy();
                }
                None => pivot.push((
                    metric.dataset_name().to_string(),
                    metric.loss(),
                    metric.accuracy(),
                )),
            }
        }

        let columns: Vec<(&str, ArrayRef)> = vec![
            (
                columns::DATASET,
                Arc::new(StringArray::from_iter_values(pivot.iter().map(|r| r.0.as_str())))
                    as ArrayRef,
            ),
            (
                columns::LOSS,
                Arc::new(Float64Array::from_iter_values(pivot.iter().map(|r| r.1))) as ArrayRef,
            ),
            (
                columns::ACC,
                Arc::new(Float64Array::from_iter_values(pivot.iter().map(|r| r.2))) as ArrayRef,
            ),
        ];
        Ok(Some(RecordBatch::try_from_iter(columns)?))
    }

    /// Human-readable summary of one experiment.
    ///
    /// # Errors
    ///
    /// Returns error if the store query fails.
    pub fn experiment_details(&self, id: ExperimentId) -> Result<Option<ExperimentDetails>> {
        let Some(experiment) = self.store.get_experiment(id)? else {
            return Ok(None);
        };
        Ok(Some(ExperimentDetails::new(
            experiment,
            self.store.latest_training_metric(id)?,
            self.store.evaluation_metrics(id)?,
        )))
    }
}

fn start_time_text(experiment: &ExperimentRecord) -> String {
    experiment.created_at().format(START_TIME_FORMAT).to_string()
}

fn config_object(
    experiment: &ExperimentRecord,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    match experiment.config().to_json()? {
        serde_json::Value::Object(map) => Ok(map),
        _ => Ok(serde_json::Map::new()),
    }
}

/// Cell text for a configuration value: strings unquoted, null as an empty cell.
fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

const FIXED_COLUMNS: [&str; 3] = [columns::ID, columns::NAME, columns::START_TIME];

/// Column name for a config key in the experiment list, never one already used.
fn config_column_name(key: &str, taken: &mut BTreeSet<String>) -> String {
    if !FIXED_COLUMNS.contains(&key) {
        return key.to_string();
    }
    let mut name = format!("config.{key}");
    while taken.contains(&name) {
        name = format!("config.{name}");
    }
    taken.insert(name.clone());
    name
}
