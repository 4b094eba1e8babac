//! Experiment configuration - the hyperparameters a run was started with

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};

use crate::{Error, Result};

/// Keys owned by the typed options of [`ExperimentConfig`].
pub const RESERVED_KEYS: [&str; 8] = [
    "batch_size",
    "hidden_size",
    "learning_rate",
    "data_path",
    "data_split_ratio",
    "max_epochs",
    "max_samples",
    "output_path",
];

/// A configuration value as handed in by the caller.
///
/// Unlike `serde_json::Value` this can hold file-system paths, which have no
/// JSON representation of their own. [`ConfigValue::into_persisted`] turns the
/// tree into JSON, replacing every path with its textual form.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// Explicit absence (`None` in a config dict).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number. Non-finite values persist as `null`.
    Float(f64),
    /// Text.
    Str(String),
    /// File-system path.
    Path(PathBuf),
    /// Sequence of values.
    List(Vec<ConfigValue>),
    /// Nested mapping.
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Convert into persistable JSON, recursively stringifying paths.
    #[must_use]
    pub fn into_persisted(self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s),
            Self::Path(p) => Value::String(p.to_string_lossy().into_owned()),
            Self::List(items) => Value::Array(items.into_iter().map(Self::into_persisted).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_persisted()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<PathBuf> for ConfigValue {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for ConfigValue {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl<T: Into<Self>> From<Option<T>> for ConfigValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ConfigValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<BTreeMap<String, T>> for ConfigValue {
    fn from(entries: BTreeMap<String, T>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            Value::String(s) => Self::Str(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Hyperparameters of an experiment.
///
/// The recognised options are typed so the dashboard can rely on stable
/// column names across experiments: unset options persist as `null`.
/// Anything experiment-specific goes into the `extra` bag, which is
/// flattened into the same JSON object on disk and therefore may not reuse
/// a [`RESERVED_KEYS`] name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Mini-batch size.
    #[serde(default)]
    pub batch_size: Option<u32>,
    /// Width of the hidden layer.
    #[serde(default)]
    pub hidden_size: Option<u32>,
    /// Optimizer learning rate.
    #[serde(default)]
    pub learning_rate: Option<f64>,
    /// Training dataset location.
    #[serde(default, serialize_with = "serialize_path")]
    pub data_path: Option<PathBuf>,
    /// Fraction of the dataset used for training, the rest is validation.
    #[serde(default)]
    pub data_split_ratio: Option<f64>,
    /// Number of epochs to train.
    #[serde(default)]
    pub max_epochs: Option<u32>,
    /// Cap on the number of samples loaded.
    #[serde(default)]
    pub max_samples: Option<u64>,
    /// Where the final model is written.
    #[serde(default, serialize_with = "serialize_path")]
    pub output_path: Option<PathBuf>,
    /// Experiment-specific keys, already in persisted form.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[allow(clippy::ref_option)]
fn serialize_path<S: Serializer>(
    path: &Option<PathBuf>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match path {
        Some(p) => serializer.serialize_some(&p.to_string_lossy()),
        None => serializer.serialize_none(),
    }
}

fn check_extra_key(key: &str) -> Result<()> {
    if RESERVED_KEYS.contains(&key) {
        return Err(Error::InvalidInput(format!(
            "config key `{key}` is a typed option, use its setter"
        )));
    }
    Ok(())
}

impl ExperimentConfig {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the hidden layer width.
    #[must_use]
    pub const fn with_hidden_size(mut self, hidden_size: u32) -> Self {
        self.hidden_size = Some(hidden_size);
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub const fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = Some(learning_rate);
        self
    }

    /// Set the training data path.
    #[must_use]
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Set the train/validation split ratio.
    #[must_use]
    pub const fn with_data_split_ratio(mut self, ratio: f64) -> Self {
        self.data_split_ratio = Some(ratio);
        self
    }

    /// Set the number of epochs.
    #[must_use]
    pub const fn with_max_epochs(mut self, max_epochs: u32) -> Self {
        self.max_epochs = Some(max_epochs);
        self
    }

    /// Set the sample cap.
    #[must_use]
    pub const fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    /// Set the model output path.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Add an experiment-specific key. Paths are stored as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `key` names a typed option.
    pub fn with_extra(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Result<Self> {
        self.set_extra(key, value)?;
        Ok(self)
    }

    /// Insert or replace an experiment-specific key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `key` names a typed option.
    pub fn set_extra(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Result<()> {
        let key = key.into();
        check_extra_key(&key)?;
        self.extra.insert(key, value.into().into_persisted());
        Ok(())
    }

    /// Check that no `extra` key shadows a typed option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        self.extra.keys().try_for_each(|key| check_extra_key(key))
    }

    /// Persisted JSON form: a flat object, unset options as `null`.
    ///
    /// # Errors
    ///
    /// Returns error if an `extra` key shadows a typed option or
    /// serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.validate()?;
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild a configuration from its persisted JSON form.
    ///
    /// # Errors
    ///
    /// Returns error if a recognised option has the wrong type.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
