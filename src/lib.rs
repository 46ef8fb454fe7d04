//! mlops-pipeline: a named multi-step ML pipeline runner.
//!
//! Runs the create data -> build features -> train model -> predict chain
//! against environment-scoped artifact storage, records every invocation
//! as a tracked run and deploys trained models that clear a quality gate.

// Core modules
pub mod cli;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod promotion;
pub mod steps;
pub mod storage;
pub mod tracking;

// Re-export commonly used error types
pub use error::{
    InvalidEnvironment, ModelError, PipelineError, RegistryError, StorageError, TrackingError,
};
