//! Data creation step.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::model::{table_shape, DataGenerator, SyntheticIris};
use crate::pipeline::{StepContext, StepEntry};
use crate::storage::{ArtifactRef, Category, PROCESSED_DATA, RAW_DATA};

/// Loads the raw dataset and writes `data/processed_data.csv`.
///
/// When no raw dataset exists the generator produces one, which is cached
/// as `data/iris.csv` for later runs.
pub struct MakeData {
    generator: Arc<dyn DataGenerator>,
}

impl MakeData {
    pub fn new(generator: Arc<dyn DataGenerator>) -> Self {
        Self { generator }
    }
}

impl Default for MakeData {
    fn default() -> Self {
        Self::new(Arc::new(SyntheticIris::default()))
    }
}

#[async_trait]
impl StepEntry for MakeData {
    fn declared_output(&self) -> Option<ArtifactRef> {
        Some(ArtifactRef::data(PROCESSED_DATA))
    }

    async fn execute(
        &self,
        ctx: &StepContext<'_>,
        _input: Option<&ArtifactRef>,
    ) -> anyhow::Result<()> {
        let raw = match ctx.store.read_table(ctx.root, Category::Data, RAW_DATA).await {
            Ok(table) => table,
            Err(StorageError::ArtifactNotFound(key)) => {
                warn!(key = %key, "Raw dataset not found, generating fallback data");
                let table = self
                    .generator
                    .generate()
                    .context("Failed to generate fallback dataset")?;
                ctx.store
                    .write_table(ctx.root, Category::Data, RAW_DATA, &table)
                    .await?;
                ctx.log_param("source", "generated").await?;
                table
            }
            Err(e) => return Err(e.into()),
        };

        // No cleaning rules yet: the processed table is the raw table.
        let (rows, cols) = table_shape(&raw);
        info!(rows, cols, "Processing dataset");
        ctx.log_param("data shape", format!("({}, {})", rows, cols))
            .await?;

        ctx.store
            .write_table(ctx.root, Category::Data, PROCESSED_DATA, &raw)
            .await?;
        Ok(())
    }
}
