//! Tensor state - named model parameters, stored as Parquet
//!
//! One row per tensor: `name` (Utf8), `shape` (List<UInt64>), `values`
//! (List<Float32>). Rows are written in name order.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float32Array, Float32Builder, ListArray, ListBuilder, RecordBatch,
    StringArray, StringBuilder, UInt64Array, UInt64Builder,
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::{Error, Result};

/// A dense `f32` tensor in row-major order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl Tensor {
    /// Create a tensor, checking that `values` fills `shape` exactly.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the element count does not match the shape.
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(Error::InvalidInput(format!(
                "tensor shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Tensor dimensions.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flat values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Model state: parameter name to tensor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TensorState {
    tensors: BTreeMap<String, Tensor>,
}

impl TensorState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a named tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    /// Look up a tensor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Number of tensors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// True if the state holds no tensors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Iterate tensors in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Columnar form of the state.
    ///
    /// # Errors
    ///
    /// Returns error if the batch cannot be assembled.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut names = StringBuilder::new();
        let mut shapes = ListBuilder::new(UInt64Builder::new());
        let mut values = ListBuilder::new(Float32Builder::new());

        for (name, tensor) in &self.tensors {
            names.append_value(name);
            for dim in &tensor.shape {
                let dim = u64::try_from(*dim)
                    .map_err(|_| Error::InvalidInput(format!("dimension {dim} too large")))?;
                shapes.values().append_value(dim);
            }
            shapes.append(true);
            values.values().append_slice(&tensor.values);
            values.append(true);
        }

        let columns: Vec<(&str, ArrayRef)> = vec![
            ("name", Arc::new(names.finish()) as ArrayRef),
            ("shape", Arc::new(shapes.finish()) as ArrayRef),
            ("values", Arc::new(values.finish()) as ArrayRef),
        ];
        Ok(RecordBatch::try_from_iter(columns)?)
    }

    /// Rebuild a state from batches produced by [`TensorState::to_record_batch`].
    ///
    /// # Errors
    ///
    /// Returns error if a column is missing, has an unexpected type, or a
    /// tensor's values do not fill its shape.
    pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Self> {
        let mut state = Self::new();
        for batch in batches {
            let names = column::<StringArray>(batch, "name")?;
            let shapes = column::<ListArray>(batch, "shape")?;
            let values = column::<ListArray>(batch, "values")?;

            for row in 0..batch.num_rows() {
                let shape_array = shapes.value(row);
                let shape = shape_array
                    .as_any()
                    .downcast_ref::<UInt64Array>()
                    .ok_or_else(|| Error::InvalidInput("shape items must be UInt64".to_string()))?
                    .values()
                    .iter()
                    .map(|&d| {
                        usize::try_from(d)
                            .map_err(|_| Error::InvalidInput(format!("dimension {d} too large")))
                    })
                    .collect::<Result<Vec<_>>>()?;

                let value_array = values.value(row);
                let flat = value_array
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| {
                        Error::InvalidInput("tensor values must be Float32".to_string())
                    })?
                    .values()
                    .to_vec();

                state.insert(names.value(row), Tensor::new(shape, flat)?);
            }
        }
        Ok(state)
    }

    /// Write the state to a Parquet file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path.as_ref())?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    /// Load a state written by [`TensorState::save`].
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or does not hold tensor rows.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Self::from_record_batches(&batches)
    }
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::InvalidInput(format!("missing column '{name}'")))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::InvalidInput(format!("column '{name}' has unexpected type")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> TensorState {
        TensorState::new()
            .with(
                "fc1.weight",
                Tensor::new(vec![2, 3], vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap(),
            )
            .with("fc1.bias", Tensor::new(vec![2], vec![-1.0, 1.0]).unwrap())
    }

    #[test]
    fn test_tensor_shape_mismatch_rejected() {
        let err = Tensor::new(vec![2, 2], vec![1.0; 3]).unwrap_err();
        assert!(err.to_string().contains("needs 4 values"));
    }

    #[test]
    fn test_record_batch_layout() {
        let batch = sample_state().to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);

        // Rows are name-ordered
        let names = column::<StringArray>(&batch, "name").unwrap();
        assert_eq!(names.value(0), "fc1.bias");
        assert_eq!(names.value(1), "fc1.weight");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epoch_1.parquet");
        let state = sample_state();

        state.save(&path).unwrap();
        let loaded = TensorState::load(&path).unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.get("fc1.weight").unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            TensorState::load(dir.path().join("nope.parquet")),
            Err(Error::Io(_))
        ));
    }
}
