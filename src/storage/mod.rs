//! Environment-scoped artifact storage.
//!
//! # Overview
//!
//! The storage system consists of:
//! - **Environment**: `local`, `dev` or `prod`, selecting a storage root
//! - **Backend**: object storage keyed by `{root}{key}` URIs
//! - **Artifacts**: datasets (`data/*.csv` plus a stored schema) and versioned models (`models/{timestamp}-{name}/`)
//!
//! # Usage
//!
//! ```rust,ignore
//! use mlops_pipeline::storage::{ArtifactStore, Category, FsBackend, ModelSelector};
//! use std::sync::Arc;
//!
//! let store = ArtifactStore::new(Arc::new(FsBackend::new(".")));
//! let root = store.resolve_root("local")?;
//!
//! let table = store.read_table(&root, Category::Data, "processed_data").await?;
//! store.write_table(&root, Category::Data, "featurized_data", &table).await?;
//!
//! let version = store.resolve_model(&root, "Tree_model", &ModelSelector::Latest).await?;
//! ```

pub mod artifacts;
pub mod backend;
pub mod environment;
pub mod table;

pub use artifacts::{
    ArtifactRef, ArtifactStore, Category, ModelSelector, FEATURIZED_DATA, LATEST, PREDICTION,
    PROCESSED_DATA, RAW_DATA,
};
pub use backend::{FsBackend, ObjectBackend};
pub use environment::{Environment, StorageRoot};
pub use table::{decode_csv, decode_schema, encode_csv, encode_schema, TableSchema};
