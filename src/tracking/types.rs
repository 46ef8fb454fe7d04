//! Run tracking data types.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::Environment;

/// Opaque identifier of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generates a fresh identifier (32 lowercase hex characters).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is safe to use as a single path component.
    pub(crate) fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Parameters and metrics logged while one step was active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl StepRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            started_at: Utc::now(),
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }
}

/// Snapshot of one pipeline invocation.
///
/// Parameters and metrics logged before the first step are attached to the
/// run itself; afterwards they go to the most recently started step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: RunId,
    pub environment: Environment,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl PipelineRun {
    /// Creates a running record.
    pub fn new(run_id: RunId, environment: Environment) -> Self {
        Self {
            run_id,
            environment,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Names of the steps that were started, in execution order.
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Record of a step by name.
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub(crate) fn set_param(&mut self, key: &str, value: &str) {
        let params = match self.steps.last_mut() {
            Some(step) => &mut step.params,
            None => &mut self.params,
        };
        params.insert(key.to_string(), value.to_string());
    }

    pub(crate) fn set_metric(&mut self, key: &str, value: f64) {
        let metrics = match self.steps.last_mut() {
            Some(step) => &mut step.metrics,
            None => &mut self.metrics,
        };
        metrics.insert(key.to_string(), value);
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_generate() {
        let a = RunId::generate();
        let b = RunId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.is_path_safe());
    }

    #[test]
    fn test_run_id_path_safety() {
        assert!(!RunId::from("../etc").is_path_safe());
        assert!(!RunId::from("a/b").is_path_safe());
        assert!(!RunId::from("").is_path_safe());
        assert!(RunId::from("abc-123_x").is_path_safe());
    }

    #[test]
    fn test_logs_route_to_active_step() {
        let mut run = PipelineRun::new(RunId::from("r1"), Environment::Local);
        run.set_param("environment", "local");
        run.steps.push(StepRecord::new("train_model"));
        run.set_param("name", "Tree_model");
        run.set_metric("f1", 0.9);

        assert_eq!(run.params.get("environment").map(String::as_str), Some("local"));
        let step = run.step("train_model").unwrap();
        assert_eq!(step.params.get("name").map(String::as_str), Some("Tree_model"));
        assert_eq!(step.metrics.get("f1"), Some(&0.9));
        assert!(run.metrics.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut run = PipelineRun::new(RunId::from("r1"), Environment::Dev);
        run.set_metric("accuracy", 0.5);
        run.set_metric("accuracy", 0.7);
        assert_eq!(run.metrics.get("accuracy"), Some(&0.7));
        assert_eq!(run.metrics.len(), 1);
    }

    #[test]
    fn test_finish() {
        let mut run = PipelineRun::new(RunId::from("r1"), Environment::Local);
        assert!(!run.status.is_terminal());
        run.finish(RunStatus::Failed);
        assert!(run.status.is_terminal());
        assert!(run.ended_at.is_some());
    }
}
