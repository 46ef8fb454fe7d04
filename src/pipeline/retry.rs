//! Retry budget applied at the caller boundary.
//!
//! The runner itself never retries. An orchestrator re-invokes the whole
//! request a fixed number of times; this mirrors that for direct callers.

use tracing::warn;

use super::runner::PipelineRunner;
use crate::error::PipelineError;
use crate::tracking::PipelineRun;

/// Runs `requested` and re-runs the whole invocation up to `retries` extra
/// times after a failure.
///
/// Validation errors and cancellations are returned immediately.
pub async fn invoke_with_retries(
    runner: &PipelineRunner,
    requested: &str,
    environment: &str,
    retries: u32,
) -> Result<PipelineRun, PipelineError> {
    let mut attempt = 0;
    loop {
        match runner.run(requested, environment).await {
            Ok(run) => return Ok(run),
            Err(e) if !is_retryable(&e) || attempt >= retries => return Err(e),
            Err(e) => {
                attempt += 1;
                warn!(
                    attempt,
                    retries,
                    error = %e,
                    "Pipeline invocation failed, retrying"
                );
            }
        }
    }
}

fn is_retryable(err: &PipelineError) -> bool {
    !err.is_validation() && !matches!(err, PipelineError::Cancelled { .. })
}
