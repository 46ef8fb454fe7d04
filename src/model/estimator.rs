//! Model-fitting collaborator.
//!
//! The pipeline never inspects a fitted model: it only needs to fit one,
//! predict with it and round-trip it through storage.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A fitted model.
pub trait Predictor: Send + Sync {
    /// Predicts one label per feature row.
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<i64>, ModelError>;

    /// Serialized form stored in the model artifact.
    fn to_bytes(&self) -> Result<Vec<u8>, ModelError>;
}

/// Fits predictors and restores them from stored bytes.
pub trait Estimator: Send + Sync {
    /// Short name recorded with the run.
    fn name(&self) -> &str;

    fn fit(
        &self,
        features: &Array2<f64>,
        labels: &Array1<i64>,
    ) -> Result<Box<dyn Predictor>, ModelError>;

    fn load(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>, ModelError>;
}

/// Nearest-centroid classifier: each class is summarized by the mean of its
/// training rows and a row is assigned to the closest mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestCentroid;

/// Fitted [`NearestCentroid`] state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    pub feature_count: usize,
    pub classes: Vec<i64>,
    pub centroids: Vec<Vec<f64>>,
}

impl Estimator for NearestCentroid {
    fn name(&self) -> &str {
        "nearest_centroid"
    }

    fn fit(
        &self,
        features: &Array2<f64>,
        labels: &Array1<i64>,
    ) -> Result<Box<dyn Predictor>, ModelError> {
        if labels.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if features.nrows() != labels.len() {
            return Err(ModelError::ShapeMismatch {
                expected: labels.len(),
                actual: features.nrows(),
            });
        }

        let feature_count = features.ncols();
        let mut sums: BTreeMap<i64, (Array1<f64>, usize)> = BTreeMap::new();
        for (row, label) in features.rows().into_iter().zip(labels.iter()) {
            let entry = sums
                .entry(*label)
                .or_insert_with(|| (Array1::zeros(feature_count), 0));
            entry.0 += &row;
            entry.1 += 1;
        }

        let mut classes = Vec::with_capacity(sums.len());
        let mut centroids = Vec::with_capacity(sums.len());
        for (label, (sum, count)) in sums {
            classes.push(label);
            centroids.push((sum / count as f64).to_vec());
        }

        Ok(Box::new(CentroidModel {
            feature_count,
            classes,
            centroids,
        }))
    }

    fn load(&self, bytes: &[u8]) -> Result<Box<dyn Predictor>, ModelError> {
        let model: CentroidModel = serde_json::from_slice(bytes)?;
        Ok(Box::new(model))
    }
}

impl CentroidModel {
    fn nearest(&self, row: ArrayView1<'_, f64>) -> i64 {
        let mut best = (f64::INFINITY, self.classes[0]);
        for (centroid, label) in self.centroids.iter().zip(&self.classes) {
            let distance: f64 = row
                .iter()
                .zip(centroid)
                .map(|(x, c)| (x - c) * (x - c))
                .sum();
            if distance < best.0 {
                best = (distance, *label);
            }
        }
        best.1
    }
}

impl Predictor for CentroidModel {
    fn predict(&self, features: &Array2<f64>) -> Result<Array1<i64>, ModelError> {
        if features.ncols() != self.feature_count {
            return Err(ModelError::ShapeMismatch {
                expected: self.feature_count,
                actual: features.ncols(),
            });
        }
        if self.classes.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        Ok(features.rows().into_iter().map(|row| self.nearest(row)).collect())
    }

    fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_and_predict() {
        let features = array![[0.0, 0.0], [0.2, 0.1], [5.0, 5.0], [5.2, 4.9]];
        let labels = array![0, 0, 1, 1];

        let model = NearestCentroid.fit(&features, &labels).unwrap();
        let predicted = model
            .predict(&array![[0.1, 0.0], [4.8, 5.1]])
            .unwrap();
        assert_eq!(predicted.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_fit_empty() {
        let features = Array2::<f64>::zeros((0, 3));
        let labels = Array1::<i64>::zeros(0);
        assert!(matches!(
            NearestCentroid.fit(&features, &labels),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn test_predict_shape_mismatch() {
        let model = NearestCentroid
            .fit(&array![[1.0, 2.0]], &array![3])
            .unwrap();
        let result = model.predict(&array![[1.0, 2.0, 3.0]]);
        assert!(matches!(
            result,
            Err(ModelError::ShapeMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_persisted_model_predicts_identically() {
        let features = array![[1.0], [2.0], [10.0], [11.0]];
        let labels = array![7, 7, 9, 9];
        let model = NearestCentroid.fit(&features, &labels).unwrap();

        let restored = NearestCentroid.load(&model.to_bytes().unwrap()).unwrap();
        let points = array![[0.0], [6.9], [12.0]];
        assert_eq!(
            model.predict(&points).unwrap(),
            restored.predict(&points).unwrap()
        );
    }
}
