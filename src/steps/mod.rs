//! Concrete pipeline steps and the default registry.
//!
//! | Step          | Reads                      | Writes                            |
//! |---------------|----------------------------|-----------------------------------|
//! | `make_data`   | `data/iris.csv`            | `data/processed_data.csv`         |
//! | `feat_data`   | `data/processed_data.csv`  | `data/featurized_data.csv`        |
//! | `train_model` | `data/featurized_data.csv` | run artifacts, `models/{version}` |
//! | `predict`     | `data/featurized_data.csv` | `data/prediction.csv`             |

pub mod feat_data;
pub mod make_data;
pub mod predict;
pub mod smoke;
pub mod train_model;

pub use feat_data::BuildFeatures;
pub use make_data::MakeData;
pub use predict::Predict;
pub use smoke::smoke_test;
pub use train_model::{TrainModel, MODEL_FILE, REPORT_FILE};

use std::sync::Arc;

use crate::error::RegistryError;
use crate::pipeline::{PipelineConfig, PlacementHint, ResourceHint, StepRegistry};

pub const MAKE_DATA: &str = "make_data";
pub const FEAT_DATA: &str = "feat_data";
pub const TRAIN_MODEL: &str = "train_model";
pub const PREDICT: &str = "predict";

/// Hints for the light steps.
pub fn default_resources() -> (ResourceHint, PlacementHint) {
    (
        ResourceHint::new("1", "1", "2000Mi", "3500Mi"),
        PlacementHint::new("t3.medium"),
    )
}

/// Hints for training.
pub fn training_resources() -> (ResourceHint, PlacementHint) {
    (
        ResourceHint::new("3", "7", "10000Mi", "15000Mi"),
        PlacementHint::new("c5.2xlarge"),
    )
}

/// Registers `make_data`, `feat_data`, `train_model` and `predict`, in that
/// order, using the model name and selector from `config`.
pub fn default_registry(config: &PipelineConfig) -> Result<StepRegistry, RegistryError> {
    let mut registry = StepRegistry::new();
    let (resources, placement) = default_resources();
    let (train_resources, train_placement) = training_resources();

    registry.register(
        MAKE_DATA,
        Arc::new(MakeData::default()),
        resources.clone(),
        placement.clone(),
    )?;
    registry.register(
        FEAT_DATA,
        Arc::new(BuildFeatures),
        resources.clone(),
        placement.clone(),
    )?;
    registry.register(
        TRAIN_MODEL,
        Arc::new(TrainModel::with_default_estimator(&config.model_name)),
        train_resources,
        train_placement,
    )?;
    registry.register(
        PREDICT,
        Arc::new(Predict::with_default_estimator(
            &config.model_name,
            config.model_selector.clone(),
        )),
        resources,
        placement,
    )?;

    Ok(registry)
}
