//! Named multi-step pipeline runner.
//!
//! # Architecture
//!
//! - **StepRegistry**: ordered declarations of named steps with their
//!   resource and placement hints
//! - **PipelineRunner**: runs `"all"` steps or one named step, sequentially,
//!   handing each step its predecessor's declared output
//! - **Config**: environment, promotion threshold, retry budget and timeout
//! - **Plan**: manifest for an external orchestrator
//!
//! # Example
//!
//! ```rust,ignore
//! use mlops_pipeline::pipeline::{PipelineConfig, PipelineRunner};
//! use mlops_pipeline::steps::default_registry;
//! use mlops_pipeline::storage::{ArtifactStore, FsBackend};
//! use mlops_pipeline::tracking::FileRunTracker;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::new().with_workdir(".");
//! let registry = default_registry(&config)?;
//! let store = ArtifactStore::new(Arc::new(FsBackend::new(&config.workdir)));
//! let tracker = Arc::new(FileRunTracker::new(&config.tracking_dir));
//!
//! let runner = PipelineRunner::new(Arc::new(registry), store, tracker, config);
//! let run = runner.run("all", "local").await?;
//! println!("executed: {:?}", run.executed_steps());
//! ```

pub mod cancel;
pub mod config;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod step;

pub use cancel::CancellationFlag;
pub use config::{ConfigError, PipelineConfig};
pub use plan::{PipelinePlan, TaskManifest, NODE_SELECTOR_KEY};
pub use registry::{Step, StepRegistry, ALL_STEPS};
pub use retry::invoke_with_retries;
pub use runner::PipelineRunner;
pub use step::{PlacementHint, ResourceHint, StepContext, StepEntry};
