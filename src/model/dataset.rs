//! Conversion between stored tables and numeric training data.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::ModelError;

/// Name of the label column in every dataset the pipeline produces.
pub const TARGET_COLUMN: &str = "specie";

/// Feature matrix and label vector extracted from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Array1<i64>,
}

impl Dataset {
    /// Splits a table into features (every column but `target`) and labels.
    pub fn from_table(table: &RecordBatch, target: &str) -> Result<Self, ModelError> {
        let schema = table.schema();
        let target_index = schema
            .index_of(target)
            .map_err(|_| ModelError::MissingColumn(target.to_string()))?;

        let mut feature_names = Vec::new();
        let mut columns = Vec::new();
        for (index, field) in schema.fields().iter().enumerate() {
            if index == target_index {
                continue;
            }
            feature_names.push(field.name().clone());
            columns.push(float_column(table.column(index), field.name())?);
        }

        let rows = table.num_rows();
        let features = Array2::from_shape_fn((rows, columns.len()), |(i, j)| columns[j][i]);
        let labels = label_column(table.column(target_index), target)?;

        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Deterministic shuffled split into `(train, test)`.
    ///
    /// The test partition holds `ceil(len * test_size)` rows.
    pub fn split(&self, test_size: f64, seed: u64) -> (Dataset, Dataset) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test_len = ((self.len() as f64) * test_size).ceil() as usize;
        let test_len = test_len.min(self.len());
        let (test, train) = indices.split_at(test_len);

        (self.select(train), self.select(test))
    }

    fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }
}

/// Returns `(rows, columns)` of a table.
pub fn table_shape(table: &RecordBatch) -> (usize, usize) {
    (table.num_rows(), table.num_columns())
}

/// Returns a copy of `table` whose `target` column holds `labels`.
///
/// The column is appended if the table does not have one.
pub fn with_target(
    table: &RecordBatch,
    target: &str,
    labels: &Array1<i64>,
) -> Result<RecordBatch, ModelError> {
    if labels.len() != table.num_rows() {
        return Err(ModelError::ShapeMismatch {
            expected: table.num_rows(),
            actual: labels.len(),
        });
    }

    let values: ArrayRef = Arc::new(Int64Array::from(labels.to_vec()));
    let target_field = Arc::new(Field::new(target, DataType::Int64, true));

    let schema = table.schema();
    let mut fields = Vec::with_capacity(schema.fields().len() + 1);
    let mut columns = Vec::with_capacity(schema.fields().len() + 1);
    let mut replaced = false;
    for (index, field) in schema.fields().iter().enumerate() {
        if field.name() == target {
            fields.push(target_field.clone());
            columns.push(values.clone());
            replaced = true;
        } else {
            fields.push(field.clone());
            columns.push(table.column(index).clone());
        }
    }
    if !replaced {
        fields.push(target_field);
        columns.push(values);
    }

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns,
    )?)
}

/// Converts a feature column to floats.
///
/// Values the cast turns into nulls were not numbers; nulls already present
/// in the source are missing values. Both are rejected.
fn float_column(column: &ArrayRef, name: &str) -> Result<Vec<f64>, ModelError> {
    let converted = cast(column, &DataType::Float64)?;
    let values = converted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| ModelError::MissingColumn(name.to_string()))?;

    let unparsed = values.null_count().saturating_sub(column.null_count());
    if unparsed > 0 {
        return Err(ModelError::NonNumericFeature {
            column: name.to_string(),
            count: unparsed,
        });
    }
    if column.null_count() > 0 {
        return Err(ModelError::MissingValues {
            column: name.to_string(),
            count: column.null_count(),
        });
    }
    Ok(values.values().to_vec())
}

fn label_column(column: &ArrayRef, name: &str) -> Result<Array1<i64>, ModelError> {
    let converted = cast(column, &DataType::Int64)?;
    let values = converted
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| ModelError::MissingColumn(name.to_string()))?;
    if values.null_count() > 0 {
        return Err(ModelError::MissingColumn(name.to_string()));
    }
    Ok(values.values().iter().copied().collect())
}
