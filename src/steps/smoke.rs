//! Environment smoke check behind `--step test`.

use tracing::info;

use crate::storage::ArtifactStore;
use crate::tracking::{RunStatus, RunTracker};

/// Resolves the storage root and records an empty run.
///
/// Returns the storage root description on success.
pub async fn smoke_test(
    store: &ArtifactStore,
    tracker: &dyn RunTracker,
    environment: &str,
) -> anyhow::Result<String> {
    let root = store.resolve_root(environment)?;
    let run_id = tracker.start_run(root.environment()).await?;
    tracker.log_param(&run_id, "check", "smoke").await?;
    tracker.end_run(&run_id, RunStatus::Completed).await?;
    tracker.get_run(&run_id).await?;

    info!(run_id = %run_id, root = %root, "Smoke test passed");
    Ok(root.describe().to_string())
}
