//! Prediction step.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use super::train_model::MODEL_FILE;
use crate::model::{with_target, ClassificationMetrics, Dataset, Estimator, NearestCentroid, TARGET_COLUMN};
use crate::pipeline::{StepContext, StepEntry};
use crate::storage::{ArtifactRef, Category, ModelSelector, FEATURIZED_DATA, PREDICTION};
use crate::tracking::ARTIFACTS_DIR;

/// Scores the featurized dataset with a deployed model and writes
/// `data/prediction.csv`.
///
/// The model version is resolved on every execution, so `latest` always
/// picks up the newest deployment.
pub struct Predict {
    model_name: String,
    selector: ModelSelector,
    estimator: Arc<dyn Estimator>,
}

impl Predict {
    pub fn new(
        model_name: impl Into<String>,
        selector: ModelSelector,
        estimator: Arc<dyn Estimator>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            selector,
            estimator,
        }
    }

    pub fn with_default_estimator(model_name: impl Into<String>, selector: ModelSelector) -> Self {
        Self::new(model_name, selector, Arc::new(NearestCentroid))
    }
}

#[async_trait]
impl StepEntry for Predict {
    fn declared_output(&self) -> Option<ArtifactRef> {
        Some(ArtifactRef::data(PREDICTION))
    }

    async fn execute(
        &self,
        ctx: &StepContext<'_>,
        input: Option<&ArtifactRef>,
    ) -> anyhow::Result<()> {
        // A preceding training step names the model family to use.
        let model_name = match input {
            Some(ArtifactRef {
                category: Category::Models,
                name,
            }) => name.as_str(),
            _ => self.model_name.as_str(),
        };

        let table = ctx
            .store
            .read_table(ctx.root, Category::Data, FEATURIZED_DATA)
            .await?;
        let dataset = Dataset::from_table(&table, TARGET_COLUMN)?;

        let version = ctx
            .store
            .resolve_model(ctx.root, model_name, &self.selector)
            .await?;
        let model_path = format!("{}/{}/{}", ARTIFACTS_DIR, model_name, MODEL_FILE);
        let bytes = ctx
            .store
            .read_model_file(ctx.root, &version, &model_path)
            .await
            .with_context(|| format!("Failed to load model '{}'", version))?;
        let predictor = self.estimator.load(&bytes)?;

        let predicted = predictor.predict(&dataset.features)?;
        let metrics = ClassificationMetrics::evaluate(&dataset.labels, &predicted);
        info!(
            model = %version,
            rows = predicted.len(),
            accuracy = metrics.accuracy,
            "Performed prediction"
        );

        let output = with_target(&table, TARGET_COLUMN, &predicted)?;
        ctx.store
            .write_table(ctx.root, Category::Data, PREDICTION, &output)
            .await?;

        ctx.log_param("model", &version).await?;
        ctx.log_metric("accuracy", metrics.accuracy).await?;
        Ok(())
    }
}
