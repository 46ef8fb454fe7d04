//! Environment-scoped artifact storage.
//!
//! Datasets are stored as `{root}data/{name}.csv` with their schema in
//! `{root}data/{name}.schema.json`, and are overwritten on every write. Models are stored as directories `{root}models/{timestamp}-{model}/`;
//! the timestamp prefix makes lexicographic order chronological, which is what
//! "latest" resolution relies on.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::backend::ObjectBackend;
use super::environment::{Environment, StorageRoot};
use super::table::{decode_csv, decode_schema, encode_csv, encode_schema};
use crate::error::StorageError;

/// Raw dataset consumed by the data creation step.
pub const RAW_DATA: &str = "iris";
/// Output of the data creation step.
pub const PROCESSED_DATA: &str = "processed_data";
/// Output of the featurization step.
pub const FEATURIZED_DATA: &str = "featurized_data";
/// Output of the prediction step.
pub const PREDICTION: &str = "prediction";

/// Selector value resolving to the newest model version.
pub const LATEST: &str = "latest";

/// Width of the `%Y-%m-%d_%H-%M-%S` prefix of a model version.
const VERSION_TIMESTAMP_LEN: usize = 19;

/// Top-level artifact category under a storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Data,
    Models,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Data => "data",
            Category::Models => "models",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical reference to an artifact, independent of environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub category: Category,
    pub name: String,
}

impl ArtifactRef {
    /// Reference to a dataset under `data/`.
    pub fn data(name: impl Into<String>) -> Self {
        Self {
            category: Category::Data,
            name: name.into(),
        }
    }

    /// Reference to a model family under `models/`.
    pub fn model(name: impl Into<String>) -> Self {
        Self {
            category: Category::Models,
            name: name.into(),
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

/// Which stored version of a model to use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSelector {
    /// Lexicographically greatest (newest) version.
    #[default]
    Latest,
    /// Exact timestamp prefix, matched as `{prefix}-{model}`.
    Version(String),
}

impl FromStr for ModelSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LATEST {
            Ok(ModelSelector::Latest)
        } else {
            Ok(ModelSelector::Version(s.to_string()))
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::Latest => f.write_str(LATEST),
            ModelSelector::Version(v) => f.write_str(v),
        }
    }
}

/// Reads and writes datasets and models under environment-scoped roots.
#[derive(Clone)]
pub struct ArtifactStore {
    backend: Arc<dyn ObjectBackend>,
}

impl ArtifactStore {
    /// Creates a store on top of an object backend.
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    /// Resolves an environment name to its storage root.
    ///
    /// Fails with [`StorageError::InvalidEnvironment`] before touching storage
    /// if the name is not one of `local`, `dev`, `prod`.
    pub fn resolve_root(&self, environment: &str) -> Result<StorageRoot, StorageError> {
        let environment: Environment = environment.parse()?;
        let root = StorageRoot::for_environment(environment);
        info!(environment = %environment, root = %root, "Using storage root");
        Ok(root)
    }

    /// Key of a table artifact.
    pub fn table_key(root: &StorageRoot, category: Category, name: &str) -> String {
        root.join(&format!("{}/{}.csv", category, name))
    }

    /// Key of the schema stored beside a table artifact.
    pub fn schema_key(root: &StorageRoot, category: Category, name: &str) -> String {
        root.join(&format!("{}/{}.schema.json", category, name))
    }

    /// Key of a stored model version directory.
    pub fn model_key(root: &StorageRoot, version: &str) -> String {
        root.join(&format!("{}/{}", Category::Models, version))
    }

    /// Reads a table. Fails with [`StorageError::ArtifactNotFound`] if absent.
    ///
    /// Columns are decoded with the schema stored at write time. A table
    /// without one has its schema inferred.
    pub async fn read_table(
        &self,
        root: &StorageRoot,
        category: Category,
        name: &str,
    ) -> Result<RecordBatch, StorageError> {
        let key = Self::table_key(root, category, name);
        let bytes = self.backend.get(&key).await?;
        let schema = match self.backend.get(&Self::schema_key(root, category, name)).await {
            Ok(data) => Some(decode_schema(&data)?),
            Err(StorageError::ArtifactNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let table = decode_csv(&bytes, schema)?;
        debug!(key = %key, rows = table.num_rows(), "Loaded table");
        Ok(table)
    }

    /// Writes a table, overwriting any previous content. Returns its key.
    pub async fn write_table(
        &self,
        root: &StorageRoot,
        category: Category,
        name: &str,
        table: &RecordBatch,
    ) -> Result<String, StorageError> {
        let key = Self::table_key(root, category, name);
        let schema = encode_schema(table)?;
        let bytes = encode_csv(table)?;
        self.backend.put(&key, &bytes).await?;
        self.backend
            .put(&Self::schema_key(root, category, name), &schema)
            .await?;
        info!(key = %key, rows = table.num_rows(), "Saved table");
        Ok(key)
    }

    /// Lists stored versions of `model_name`, newest first.
    ///
    /// Version identifiers are `{timestamp}-{model_name}` directory names.
    /// The model name must match exactly, so `old-m` versions are not
    /// versions of `m`.
    pub async fn list_model_versions(
        &self,
        root: &StorageRoot,
        model_name: &str,
    ) -> Result<Vec<String>, StorageError> {
        let prefix = root.join(&format!("{}/", Category::Models));

        let mut versions: Vec<String> = self
            .backend
            .list_dirs(&prefix)
            .await?
            .into_iter()
            .filter(|name| version_model(name) == Some(model_name))
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));

        debug!(model = model_name, versions = ?versions, "Listed model versions");
        Ok(versions)
    }

    /// Resolves a selector to an existing model version.
    ///
    /// Always re-queries storage; fails with [`StorageError::ModelNotFound`]
    /// when nothing matches.
    pub async fn resolve_model(
        &self,
        root: &StorageRoot,
        model_name: &str,
        selector: &ModelSelector,
    ) -> Result<String, StorageError> {
        let versions = self.list_model_versions(root, model_name).await?;
        let not_found = || StorageError::ModelNotFound {
            model: model_name.to_string(),
            selector: selector.to_string(),
        };

        let version = match selector {
            ModelSelector::Latest => versions.into_iter().next().ok_or_else(not_found)?,
            ModelSelector::Version(prefix) => {
                let wanted = format!("{}-{}", prefix, model_name);
                versions
                    .into_iter()
                    .find(|v| *v == wanted)
                    .ok_or_else(not_found)?
            }
        };

        info!(model = model_name, selector = %selector, version = %version, "Resolved model");
        Ok(version)
    }

    /// Reads one file inside a stored model version.
    pub async fn read_model_file(
        &self,
        root: &StorageRoot,
        version: &str,
        relative: &str,
    ) -> Result<Vec<u8>, StorageError> {
        let key = format!("{}/{}", Self::model_key(root, version), relative);
        self.backend.get(&key).await
    }

    /// Copies a local directory tree into `models/{version}`.
    pub async fn publish_model_tree(
        &self,
        root: &StorageRoot,
        source: &Path,
        version: &str,
    ) -> Result<String, StorageError> {
        let key = Self::model_key(root, version);
        let files = self.backend.put_tree(source, &key).await?;
        info!(key = %key, files, "Published model tree");
        Ok(key)
    }
}

/// Model name part of a `{timestamp}-{model}` version identifier.
fn version_model(version: &str) -> Option<&str> {
    let (timestamp, rest) = version.split_at_checked(VERSION_TIMESTAMP_LEN)?;
    if !timestamp.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'_') {
        return None;
    }
    rest.strip_prefix('-')
}
