//! Error types for pipeline operations.
//!
//! Defines error types for each subsystem:
//! - Environment parsing
//! - Step registry declarations
//! - Artifact storage (tables and model versions)
//! - Run tracking
//! - Model fitting
//! - Pipeline execution

use thiserror::Error;

/// An environment name outside of `local`, `dev` and `prod`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid environment '{0}': expected one of local, dev, prod")]
pub struct InvalidEnvironment(pub String);

/// Errors that can occur while declaring or looking up steps.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Step '{0}' is already registered")]
    DuplicateStep(String),

    #[error("Step '{0}' is not registered")]
    UnknownStep(String),

    #[error("Invalid step name '{0}'")]
    InvalidName(String),
}

/// Errors that can occur during artifact storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    InvalidEnvironment(#[from] InvalidEnvironment),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Model '{model}' not found for selector '{selector}'")]
    ModelNotFound { model: String, selector: String },

    #[error("Unsupported storage URI '{0}': no remote mount configured")]
    UnsupportedUri(String),

    #[error("Column '{column}' has type {data_type}, which cannot be stored as CSV")]
    UnsupportedColumnType { column: String, data_type: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table encoding error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while recording runs.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("Run '{0}' not found")]
    UnknownRun(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the model-fitting collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Cannot fit a model on an empty training set")]
    EmptyTrainingSet,

    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Column '{0}' is missing or has an unsupported type")]
    MissingColumn(String),

    #[error("Feature column '{column}' has {count} non-numeric value(s)")]
    NonNumericFeature { column: String, count: usize },

    #[error("Feature column '{column}' has {count} missing value(s)")]
    MissingValues { column: String, count: usize },

    #[error("Data generation failed: {0}")]
    Generation(String),

    #[error("Table conversion error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid step request '{0}'")]
    InvalidStep(String),

    #[error(transparent)]
    InvalidEnvironment(#[from] InvalidEnvironment),

    #[error("Unknown step '{0}'")]
    UnknownStep(String),

    #[error("Step '{step}' failed: {source:#}")]
    StepExecution {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Pipeline cancelled before step '{next}'")]
    Cancelled { next: String },

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),
}

impl PipelineError {
    /// Whether the error was raised by request validation, before any step ran.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidStep(_)
                | PipelineError::InvalidEnvironment(_)
                | PipelineError::UnknownStep(_)
        )
    }
}

impl From<RegistryError> for PipelineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownStep(name) => PipelineError::UnknownStep(name),
            RegistryError::DuplicateStep(name) | RegistryError::InvalidName(name) => {
                PipelineError::InvalidStep(name)
            }
        }
    }
}
