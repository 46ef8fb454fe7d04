//! Model fitting, evaluation and fallback data generation.
//!
//! The pipeline treats the model-fitting library as opaque: given training
//! data it returns a fitted [`Predictor`]. Tables are converted to `ndarray`
//! matrices by [`Dataset`], and trained models are scored with
//! [`ClassificationMetrics`].

pub mod dataset;
pub mod estimator;
pub mod metrics;
pub mod synthetic;

pub use dataset::{table_shape, with_target, Dataset, TARGET_COLUMN};
pub use estimator::{CentroidModel, Estimator, NearestCentroid, Predictor};
pub use metrics::ClassificationMetrics;
pub use synthetic::{DataGenerator, SyntheticIris};
