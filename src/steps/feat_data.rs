//! Featurization step.

use async_trait::async_trait;
use tracing::info;

use crate::model::table_shape;
use crate::pipeline::{StepContext, StepEntry};
use crate::storage::{ArtifactRef, Category, FEATURIZED_DATA, PROCESSED_DATA};

/// Reads the processed dataset and writes `data/featurized_data.csv`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildFeatures;

#[async_trait]
impl StepEntry for BuildFeatures {
    fn declared_output(&self) -> Option<ArtifactRef> {
        Some(ArtifactRef::data(FEATURIZED_DATA))
    }

    async fn execute(
        &self,
        ctx: &StepContext<'_>,
        input: Option<&ArtifactRef>,
    ) -> anyhow::Result<()> {
        let source = input
            .map(|r| r.name.as_str())
            .unwrap_or(PROCESSED_DATA);
        let table = ctx.store.read_table(ctx.root, Category::Data, source).await?;

        // Derived columns go here; the current feature set is the input columns.
        let (rows, cols) = table_shape(&table);
        info!(source, rows, cols, "Building features");

        ctx.store
            .write_table(ctx.root, Category::Data, FEATURIZED_DATA, &table)
            .await?;
        Ok(())
    }
}
