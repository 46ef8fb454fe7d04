//! Run tracking for pipeline invocations.
//!
//! A run is opened when the pipeline starts. Each step opens its own scope
//! inside the run and logs parameters (`String -> String`) and metrics
//! (`String -> f64`) against the shared run id.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mlops_pipeline::tracking::{FileRunTracker, RunTracker, RunStatus};
//! use mlops_pipeline::storage::Environment;
//!
//! let tracker = FileRunTracker::new("mlruns");
//! let run_id = tracker.start_run(Environment::Local).await?;
//! tracker.begin_step(&run_id, "train_model").await?;
//! tracker.log_metric(&run_id, "f1", 0.93).await?;
//! tracker.end_run(&run_id, RunStatus::Completed).await?;
//! ```

pub mod tracker;
pub mod types;

pub use tracker::{FileRunTracker, RunTracker, ARTIFACTS_DIR};
pub use types::{PipelineRun, RunId, RunStatus, StepRecord};
