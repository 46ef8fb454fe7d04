//! Run tracker contract and its file-backed implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{PipelineRun, RunId, RunStatus, StepRecord};
use crate::error::TrackingError;
use crate::storage::Environment;

const RUN_FILENAME: &str = "run.json";
/// Sub-directory of a run holding the files its steps produce.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Records parameters and metrics for pipeline runs.
///
/// Every step of one invocation logs against the same run id, so all of its
/// metrics are attributable to a single run. For a repeated key the last
/// write wins.
#[async_trait]
pub trait RunTracker: Send + Sync {
    /// Starts a new run and returns its id.
    async fn start_run(&self, environment: Environment) -> Result<RunId, TrackingError>;

    /// Opens the scope of `step`; later logs are attributed to it.
    async fn begin_step(&self, run_id: &RunId, step: &str) -> Result<(), TrackingError>;

    async fn log_param(&self, run_id: &RunId, key: &str, value: &str) -> Result<(), TrackingError>;

    async fn log_metric(&self, run_id: &RunId, key: &str, value: f64) -> Result<(), TrackingError>;

    /// Marks the run as finished with `status`.
    async fn end_run(&self, run_id: &RunId, status: RunStatus) -> Result<(), TrackingError>;

    /// Returns a snapshot of the run. Fails with `UnknownRun` if it was never started.
    async fn get_run(&self, run_id: &RunId) -> Result<PipelineRun, TrackingError>;

    /// Local directory holding everything recorded for the run.
    fn run_dir(&self, run_id: &RunId) -> PathBuf;

    /// Local directory where steps store files belonging to the run.
    fn artifact_dir(&self, run_id: &RunId) -> PathBuf {
        self.run_dir(run_id).join(ARTIFACTS_DIR)
    }
}

/// Tracker persisting each run as `{base}/{run_id}/run.json`.
///
/// Run files written by earlier invocations can be read back with
/// [`RunTracker::get_run`]. Runs are never purged.
pub struct FileRunTracker {
    base_path: PathBuf,
    runs: RwLock<HashMap<RunId, PipelineRun>>,
}

impl FileRunTracker {
    /// Creates a tracker storing runs under `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the base tracking path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn persist(&self, run: &PipelineRun) -> Result<(), TrackingError> {
        let dir = self.run_dir(&run.run_id);
        fs::create_dir_all(&dir).await?;
        let json = serde_json::to_string_pretty(run)?;
        fs::write(dir.join(RUN_FILENAME), json).await?;
        Ok(())
    }

    async fn load(&self, run_id: &RunId) -> Result<PipelineRun, TrackingError> {
        if !run_id.is_path_safe() {
            return Err(TrackingError::UnknownRun(run_id.to_string()));
        }
        let path = self.run_dir(run_id).join(RUN_FILENAME);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrackingError::UnknownRun(run_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    /// Applies `mutate` to the run and persists the result.
    async fn update<F>(&self, run_id: &RunId, mutate: F) -> Result<(), TrackingError>
    where
        F: FnOnce(&mut PipelineRun) + Send,
    {
        let mut runs = self.runs.write().await;
        if !runs.contains_key(run_id) {
            let loaded = self.load(run_id).await?;
            runs.insert(run_id.clone(), loaded);
        }
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| TrackingError::UnknownRun(run_id.to_string()))?;
        mutate(run);
        self.persist(run).await
    }
}

#[async_trait]
impl RunTracker for FileRunTracker {
    async fn start_run(&self, environment: Environment) -> Result<RunId, TrackingError> {
        let run_id = RunId::generate();
        let run = PipelineRun::new(run_id.clone(), environment);

        fs::create_dir_all(self.artifact_dir(&run_id)).await?;
        self.persist(&run).await?;
        self.runs.write().await.insert(run_id.clone(), run);

        info!(run_id = %run_id, environment = %environment, "Started run");
        Ok(run_id)
    }

    async fn begin_step(&self, run_id: &RunId, step: &str) -> Result<(), TrackingError> {
        self.update(run_id, |run| run.steps.push(StepRecord::new(step)))
            .await?;
        debug!(run_id = %run_id, step, "Opened step scope");
        Ok(())
    }

    async fn log_param(&self, run_id: &RunId, key: &str, value: &str) -> Result<(), TrackingError> {
        self.update(run_id, |run| run.set_param(key, value)).await?;
        debug!(run_id = %run_id, key, value, "Logged param");
        Ok(())
    }

    async fn log_metric(&self, run_id: &RunId, key: &str, value: f64) -> Result<(), TrackingError> {
        self.update(run_id, |run| run.set_metric(key, value)).await?;
        debug!(run_id = %run_id, key, value, "Logged metric");
        Ok(())
    }

    async fn end_run(&self, run_id: &RunId, status: RunStatus) -> Result<(), TrackingError> {
        self.update(run_id, |run| run.finish(status)).await?;
        info!(run_id = %run_id, status = %status, "Ended run");
        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<PipelineRun, TrackingError> {
        if let Some(run) = self.runs.read().await.get(run_id) {
            return Ok(run.clone());
        }
        self.load(run_id).await
    }

    fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.base_path.join(run_id.as_str())
    }
}
