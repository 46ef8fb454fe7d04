//! Step declarations: the unit of work plus its execution hints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::PipelineConfig;
use crate::error::TrackingError;
use crate::storage::{ArtifactRef, ArtifactStore, Environment, StorageRoot};
use crate::tracking::{RunId, RunTracker};

/// CPU and memory request/limit forwarded verbatim to the execution host.
///
/// Values are opaque strings in the host's notation (`"3"`, `"10000Mi"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHint {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
}

impl ResourceHint {
    pub fn new(
        cpu_request: impl Into<String>,
        cpu_limit: impl Into<String>,
        memory_request: impl Into<String>,
        memory_limit: impl Into<String>,
    ) -> Self {
        Self {
            cpu_request: cpu_request.into(),
            cpu_limit: cpu_limit.into(),
            memory_request: memory_request.into(),
            memory_limit: memory_limit.into(),
        }
    }
}

/// Node class a step should be scheduled on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementHint {
    pub node_class: String,
}

impl PlacementHint {
    pub fn new(node_class: impl Into<String>) -> Self {
        Self {
            node_class: node_class.into(),
        }
    }
}

/// Everything a step may touch while it executes.
///
/// All steps of one invocation share the same environment, root and run id.
pub struct StepContext<'a> {
    pub environment: Environment,
    pub root: &'a StorageRoot,
    pub store: &'a ArtifactStore,
    pub tracker: &'a dyn RunTracker,
    pub run_id: &'a RunId,
    pub config: &'a PipelineConfig,
}

impl StepContext<'_> {
    /// Logs a parameter against the current step of the run.
    pub async fn log_param(&self, key: &str, value: impl AsRef<str>) -> Result<(), TrackingError> {
        self.tracker.log_param(self.run_id, key, value.as_ref()).await
    }

    /// Logs a metric against the current step of the run.
    pub async fn log_metric(&self, key: &str, value: f64) -> Result<(), TrackingError> {
        self.tracker.log_metric(self.run_id, key, value).await
    }
}

/// Entry point of a registered step.
#[async_trait]
pub trait StepEntry: Send + Sync {
    /// Artifact this step produces, handed to its successor as input.
    fn declared_output(&self) -> Option<ArtifactRef> {
        None
    }

    /// Runs the step. `input` is the declared output of the preceding
    /// registered step, if any.
    async fn execute(
        &self,
        ctx: &StepContext<'_>,
        input: Option<&ArtifactRef>,
    ) -> anyhow::Result<()>;
}
