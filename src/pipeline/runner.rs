//! Sequential execution of registered steps.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::cancel::CancellationFlag;
use super::config::PipelineConfig;
use super::registry::{Step, StepRegistry, ALL_STEPS};
use super::step::StepContext;
use crate::error::PipelineError;
use crate::storage::{ArtifactStore, Environment, StorageRoot};
use crate::tracking::{PipelineRun, RunId, RunStatus, RunTracker};

/// Runs either every registered step or a single named one.
///
/// Steps execute one after another; a step only starts after its
/// predecessor in the slice returned successfully. A named step runs alone,
/// never together with the steps that follow it. There is no resume: after a
/// failure the caller re-invokes from the step it wants.
pub struct PipelineRunner {
    registry: Arc<StepRegistry>,
    store: ArtifactStore,
    tracker: Arc<dyn RunTracker>,
    config: PipelineConfig,
    cancel: CancellationFlag,
}

impl PipelineRunner {
    pub fn new(
        registry: Arc<StepRegistry>,
        store: ArtifactStore,
        tracker: Arc<dyn RunTracker>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            store,
            tracker,
            config,
            cancel: CancellationFlag::new(),
        }
    }

    /// Uses an externally owned cancellation flag.
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Computes the execution slice for a request.
    ///
    /// `"all"` selects every step in registration order; any other
    /// well-formed name selects exactly that step.
    ///
    /// # Errors
    ///
    /// - `InvalidStep` for an empty name or one containing whitespace.
    /// - `UnknownStep` for a name that is not registered.
    pub fn select(&self, requested: &str) -> Result<Vec<&Step>, PipelineError> {
        if requested.is_empty() || requested.chars().any(char::is_whitespace) {
            return Err(PipelineError::InvalidStep(requested.to_string()));
        }
        if requested == ALL_STEPS {
            return Ok(self.registry.ordered().collect());
        }
        Ok(vec![self.registry.by_name(requested)?])
    }

    /// Runs the requested steps against `environment`.
    ///
    /// The request and the environment are both validated before a run is
    /// started or any step executes. Every step logs against the same run id.
    /// The first failing step stops the invocation and is surfaced as
    /// `StepExecution`.
    pub async fn run(
        &self,
        requested: &str,
        environment: &str,
    ) -> Result<PipelineRun, PipelineError> {
        let slice = self.select(requested)?;
        let environment: Environment = environment.parse()?;
        let root = StorageRoot::for_environment(environment);

        let run_id = self.tracker.start_run(environment).await?;
        info!(
            run_id = %run_id,
            requested,
            environment = %environment,
            root = %root,
            steps = slice.len(),
            "Starting pipeline"
        );

        for step in slice {
            if self.cancel.is_cancelled() {
                warn!(run_id = %run_id, next = %step.name, "Pipeline cancelled");
                self.close(&run_id, RunStatus::Cancelled).await;
                return Err(PipelineError::Cancelled {
                    next: step.name.clone(),
                });
            }

            self.tracker.begin_step(&run_id, &step.name).await?;
            let input = self.registry.input_of(step);
            let ctx = StepContext {
                environment,
                root: &root,
                store: &self.store,
                tracker: self.tracker.as_ref(),
                run_id: &run_id,
                config: &self.config,
            };

            info!(step = %step.name, input = ?input.as_ref().map(ToString::to_string), "Running step");
            let started = Instant::now();
            if let Err(source) = step.entry.execute(&ctx, input.as_ref()).await {
                error!(step = %step.name, error = %format!("{:#}", source), "Step failed");
                self.close(&run_id, RunStatus::Failed).await;
                return Err(PipelineError::StepExecution {
                    step: step.name.clone(),
                    source,
                });
            }
            info!(
                step = %step.name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Step completed"
            );
        }

        self.tracker.end_run(&run_id, RunStatus::Completed).await?;
        let run = self.tracker.get_run(&run_id).await?;
        info!(run_id = %run_id, steps = ?run.executed_steps(), "Pipeline completed");
        Ok(run)
    }

    /// Finalizes a run on an error path without masking the original error.
    async fn close(&self, run_id: &RunId, status: RunStatus) {
        if let Err(e) = self.tracker.end_run(run_id, status).await {
            warn!(run_id = %run_id, error = %e, "Failed to finalize run");
        }
    }
}
