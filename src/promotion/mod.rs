//! Promotion gate for trained models.
//!
//! A model trained in a run lives in that run's artifact directory. If its
//! quality metric clears the threshold, the whole directory is copied to
//! `models/{timestamp}-{model}` under the storage root, where prediction
//! can discover it. The source is never moved or modified.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StorageError;
use crate::storage::{ArtifactStore, StorageRoot};

/// Timestamp format of model version prefixes. Lexicographic order matches
/// chronological order.
pub const VERSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Returns true when `metric` strictly exceeds `threshold`.
///
/// A metric equal to the threshold does not promote.
pub fn evaluate(metric: f64, threshold: f64) -> bool {
    metric > threshold
}

/// Formats a version timestamp prefix.
pub fn version_timestamp(at: DateTime<Utc>) -> String {
    at.format(VERSION_TIMESTAMP_FORMAT).to_string()
}

/// Composes the version identifier `{timestamp}-{model}`.
pub fn version_name(at: DateTime<Utc>, model_name: &str) -> String {
    format!("{}-{}", version_timestamp(at), model_name)
}

/// A trained model waiting for the promotion decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCandidate {
    /// Local directory holding the trained model.
    pub location: PathBuf,
    /// Quality metric compared against the threshold.
    pub metric: f64,
    pub promoted: bool,
    /// Key of the promoted copy, set once promoted.
    pub destination: Option<String>,
}

impl ModelCandidate {
    pub fn new(location: impl Into<PathBuf>, metric: f64) -> Self {
        Self {
            location: location.into(),
            metric,
            promoted: false,
            destination: None,
        }
    }
}

/// Applies a fixed threshold and copies promoted candidates.
#[derive(Debug, Clone, Copy)]
pub struct PromotionGate {
    threshold: f64,
}

impl PromotionGate {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decides and, when the metric clears the threshold, promotes the
    /// candidate under `root`.
    ///
    /// A failed copy is returned as an error and leaves `promoted` false.
    pub async fn review(
        &self,
        store: &ArtifactStore,
        root: &StorageRoot,
        candidate: &mut ModelCandidate,
        model_name: &str,
    ) -> Result<(), StorageError> {
        if !evaluate(candidate.metric, self.threshold) {
            info!(
                metric = candidate.metric,
                threshold = self.threshold,
                "Model below threshold, not deployed"
            );
            return Ok(());
        }

        let destination = promote(store, root, &candidate.location, model_name, Utc::now()).await?;
        candidate.promoted = true;
        candidate.destination = Some(destination);
        Ok(())
    }
}

/// Copies `source` recursively to `models/{timestamp}-{model}` and returns the
/// destination key.
pub async fn promote(
    store: &ArtifactStore,
    root: &StorageRoot,
    source: &Path,
    model_name: &str,
    at: DateTime<Utc>,
) -> Result<String, StorageError> {
    let version = version_name(at, model_name);
    let destination = store.publish_model_tree(root, source, &version).await?;
    info!(source = %source.display(), destination = %destination, "Model deployed");
    Ok(destination)
}
