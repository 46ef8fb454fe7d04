//! Fallback data generation when no raw dataset is available.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::dataset::TARGET_COLUMN;
use crate::error::ModelError;

/// Produces a raw dataset from scratch.
pub trait DataGenerator: Send + Sync {
    fn generate(&self) -> Result<RecordBatch, ModelError>;
}

const FEATURE_NAMES: [&str; 4] = [
    "sepal length (cm)",
    "sepal width (cm)",
    "petal length (cm)",
    "petal width (cm)",
];

/// Per-class (mean, std) of each feature, shaped after the iris flower data.
const CLASS_PROFILES: [[(f64, f64); 4]; 3] = [
    [(5.01, 0.35), (3.43, 0.38), (1.46, 0.17), (0.25, 0.11)],
    [(5.94, 0.52), (2.77, 0.31), (4.26, 0.47), (1.33, 0.20)],
    [(6.59, 0.64), (2.97, 0.32), (5.55, 0.55), (2.03, 0.27)],
];

/// Seeded three-class Gaussian dataset with iris-like columns and an integer
/// `specie` label.
#[derive(Debug, Clone)]
pub struct SyntheticIris {
    pub seed: u64,
    pub rows_per_class: usize,
}

impl Default for SyntheticIris {
    fn default() -> Self {
        Self {
            seed: 42,
            rows_per_class: 50,
        }
    }
}

impl SyntheticIris {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

impl DataGenerator for SyntheticIris {
    fn generate(&self) -> Result<RecordBatch, ModelError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let rows = CLASS_PROFILES.len() * self.rows_per_class;

        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); FEATURE_NAMES.len()];
        let mut labels = Vec::with_capacity(rows);

        for (class, profile) in CLASS_PROFILES.iter().enumerate() {
            let distributions = profile
                .iter()
                .map(|(mean, std_dev)| {
                    rand_distr::Normal::new(*mean, *std_dev)
                        .map_err(|e| ModelError::Generation(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for _ in 0..self.rows_per_class {
                for (column, normal) in columns.iter_mut().zip(&distributions) {
                    let value: f64 = rng.sample(normal);
                    // One decimal like the field measurements; never non-positive.
                    column.push((value.max(0.1) * 10.0).round() / 10.0);
                }
                labels.push(class as i64);
            }
        }

        let mut fields: Vec<Field> = FEATURE_NAMES
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, true))
            .collect();
        fields.push(Field::new(TARGET_COLUMN, DataType::Int64, true));

        let mut arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|values| Arc::new(Float64Array::from(values)) as ArrayRef)
            .collect();
        arrays.push(Arc::new(Int64Array::from(labels)));

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}
