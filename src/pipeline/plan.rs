//! Task manifest handed to an external orchestrator.
//!
//! Each registered step becomes one task invoking this binary with
//! `--step <name> --environment <env>`. Resource and placement hints are
//! copied as-is; the pipeline never interprets them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::config::PipelineConfig;
use super::registry::StepRegistry;
use super::step::ResourceHint;
use crate::storage::Environment;

/// Node label the placement hint is applied to.
pub const NODE_SELECTOR_KEY: &str = "node.kubernetes.io/flavor";

/// One orchestrator task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskManifest {
    pub task_id: String,
    pub arguments: Vec<String>,
    pub resources: ResourceHint,
    pub node_selector: BTreeMap<String, String>,
    /// Tasks that must finish first.
    pub upstream: Vec<String>,
}

/// Linear chain of tasks plus the invocation-level policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub environment: Environment,
    pub retries: u32,
    pub timeout_secs: u64,
    pub tasks: Vec<TaskManifest>,
}

impl PipelinePlan {
    /// Builds the manifest for every registered step, in order.
    pub fn build(registry: &StepRegistry, environment: Environment, config: &PipelineConfig) -> Self {
        let tasks = registry
            .ordered()
            .map(|step| TaskManifest {
                task_id: step.name.clone(),
                arguments: vec![
                    "--step".to_string(),
                    step.name.clone(),
                    "--environment".to_string(),
                    environment.to_string(),
                ],
                resources: step.resources.clone(),
                node_selector: BTreeMap::from([(
                    NODE_SELECTOR_KEY.to_string(),
                    step.placement.node_class.clone(),
                )]),
                upstream: registry
                    .predecessor(step)
                    .map(|p| vec![p.name.clone()])
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            environment,
            retries: config.retries,
            timeout_secs: config.timeout.as_secs(),
            tasks,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
