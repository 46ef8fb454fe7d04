//! Model training step.
//!
//! Fits a model on the featurized dataset, logs its scores against the run
//! and hands it to the promotion gate. Only models whose F1 strictly exceeds
//! the configured threshold are copied to `models/`.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use rand::prelude::*;
use tokio::fs;
use tracing::info;

use crate::model::{
    table_shape, ClassificationMetrics, Dataset, Estimator, NearestCentroid, TARGET_COLUMN,
};
use crate::pipeline::{StepContext, StepEntry};
use crate::promotion::{version_timestamp, ModelCandidate, PromotionGate};
use crate::storage::{ArtifactRef, Category, FEATURIZED_DATA};

/// File holding the serialized model inside `artifacts/{model_name}/`.
pub const MODEL_FILE: &str = "model.json";
/// Human readable evaluation stored next to the model.
pub const REPORT_FILE: &str = "report.txt";

const VERSION_SUFFIX_LEN: usize = 8;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Trains, evaluates and conditionally promotes a model.
pub struct TrainModel {
    model_name: String,
    estimator: Arc<dyn Estimator>,
}

impl TrainModel {
    pub fn new(model_name: impl Into<String>, estimator: Arc<dyn Estimator>) -> Self {
        Self {
            model_name: model_name.into(),
            estimator,
        }
    }

    pub fn with_default_estimator(model_name: impl Into<String>) -> Self {
        Self::new(model_name, Arc::new(NearestCentroid))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl StepEntry for TrainModel {
    fn declared_output(&self) -> Option<ArtifactRef> {
        Some(ArtifactRef::model(&self.model_name))
    }

    async fn execute(
        &self,
        ctx: &StepContext<'_>,
        input: Option<&ArtifactRef>,
    ) -> anyhow::Result<()> {
        let source = input
            .map(|r| r.name.as_str())
            .unwrap_or(FEATURIZED_DATA);
        let table = ctx.store.read_table(ctx.root, Category::Data, source).await?;
        let (rows, cols) = table_shape(&table);

        let version_name = dataset_version_name(&self.model_name);
        let version_key = ctx
            .store
            .write_table(ctx.root, Category::Data, &version_name, &table)
            .await
            .context("Failed to version training dataset")?;
        info!(key = %version_key, "Versioned training dataset");

        let dataset = Dataset::from_table(&table, TARGET_COLUMN)?;
        let seed = ctx.config.random_seed;
        let (train, test) = dataset.split(ctx.config.test_size, seed);
        info!(
            model = %self.model_name,
            estimator = self.estimator.name(),
            train_rows = train.len(),
            test_rows = test.len(),
            "Training model"
        );

        let predictor = self.estimator.fit(&train.features, &train.labels)?;
        let predicted = predictor.predict(&test.features)?;
        let metrics = ClassificationMetrics::evaluate(&test.labels, &predicted);
        info!(
            model = %self.model_name,
            accuracy = metrics.accuracy,
            f1 = metrics.f1,
            precision = metrics.precision,
            recall = metrics.recall,
            "Evaluated model"
        );

        ctx.log_param("name", &self.model_name).await?;
        ctx.log_param("data", &version_key).await?;
        ctx.log_param("data shape", format!("({}, {})", rows, cols))
            .await?;
        ctx.log_metric("rndm", seed as f64).await?;
        ctx.log_metric("accuracy", metrics.accuracy).await?;
        ctx.log_metric("f1", metrics.f1).await?;
        ctx.log_metric("precision", metrics.precision).await?;
        ctx.log_metric("recall", metrics.recall).await?;

        let model_dir = ctx.tracker.artifact_dir(ctx.run_id).join(&self.model_name);
        fs::create_dir_all(&model_dir).await?;
        fs::write(model_dir.join(MODEL_FILE), predictor.to_bytes()?).await?;
        fs::write(model_dir.join(REPORT_FILE), render_report(&metrics)).await?;
        info!(path = %model_dir.display(), "Stored model in run artifacts");

        let mut candidate = ModelCandidate::new(ctx.tracker.run_dir(ctx.run_id), metrics.f1);
        PromotionGate::new(ctx.config.f1_threshold)
            .review(ctx.store, ctx.root, &mut candidate, &self.model_name)
            .await
            .context("Failed to deploy model")?;

        if let Some(destination) = &candidate.destination {
            ctx.log_param("deploy", destination).await?;
        }
        Ok(())
    }
}

/// `{model}_{timestamp}_{8 random letters}`, unique per training run.
fn dataset_version_name(model_name: &str) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..VERSION_SUFFIX_LEN)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect();
    format!("{}_{}_{}", model_name, version_timestamp(Utc::now()), suffix)
}

fn render_report(metrics: &ClassificationMetrics) -> String {
    format!(
        "{}\nconfusion matrix:\n{}\n\nconfusion matrix (%):\n{:.1}\n",
        metrics.report(),
        metrics.confusion,
        metrics.confusion_percent()
    )
}
