//! Artifacts written into an experiment's directory
//!
//! The kind of an artifact is chosen by the caller, never inferred from the
//! shape of the value:
//!
//! - [`Artifact::TensorState`]: model parameters, written as Parquet
//! - [`Artifact::Structured`]: plain data, written as pretty JSON with paths stringified
//! - [`Artifact::Custom`]: anything implementing [`SaveArtifact`]

mod tensor_state;

pub use tensor_state::{Tensor, TensorState};

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::experiment::ConfigValue;
use crate::Result;

/// A value that knows how to write itself to disk.
pub trait SaveArtifact: Send + Sync {
    /// Write the artifact to `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the artifact cannot be written.
    fn save(&self, path: &Path) -> Result<()>;

    /// File extension used when the tracker names the file (checkpoints).
    fn extension(&self) -> &str;
}

/// An artifact together with its serialization path.
pub enum Artifact {
    /// Model state dictionary.
    TensorState(TensorState),
    /// Records and sequences of primitives.
    Structured(ConfigValue),
    /// Self-serializing value.
    Custom(Box<dyn SaveArtifact>),
}

impl Artifact {
    /// Wrap a self-serializing value.
    pub fn custom(artifact: impl SaveArtifact + 'static) -> Self {
        Self::Custom(Box::new(artifact))
    }

    /// Extension for tracker-named files such as `epoch_<N>.<ext>`.
    #[must_use]
    pub fn extension(&self) -> &str {
        match self {
            Self::TensorState(_) => "parquet",
            Self::Structured(_) => "json",
            Self::Custom(artifact) => artifact.extension(),
        }
    }

    /// Write the artifact to `path`. Not atomic: a failure can leave a partial file.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        match self {
            Self::TensorState(state) => state.save(path),
            Self::Structured(value) => {
                let mut writer = BufWriter::new(File::create(path)?);
                serde_json::to_writer_pretty(&mut writer, &value.clone().into_persisted())?;
                writer.flush()?;
                Ok(())
            }
            Self::Custom(artifact) => artifact.save(path),
        }
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TensorState(state) => f.debug_tuple("TensorState").field(&state.len()).finish(),
            Self::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
            Self::Custom(artifact) => f
                .debug_tuple("Custom")
                .field(&artifact.extension())
                .finish(),
        }
    }
}

impl From<TensorState> for Artifact {
    fn from(state: TensorState) -> Self {
        Self::TensorState(state)
    }
}

impl From<ConfigValue> for Artifact {
    fn from(value: ConfigValue) -> Self {
        Self::Structured(value)
    }
}
