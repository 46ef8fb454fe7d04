//! Object storage backends.
//!
//! The pipeline addresses artifacts by URI-like keys: a plain relative key
//! (`data/processed_data.csv`) for local storage and `s3://bucket-{env}/...`
//! for remote environments. A backend maps those keys onto bytes.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::StorageError;

const REMOTE_SCHEME: &str = "s3://";

/// Storage backend consumed by [`ArtifactStore`](super::ArtifactStore).
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Reads the whole object at `uri`.
    ///
    /// Fails with [`StorageError::ArtifactNotFound`] if it does not exist.
    async fn get(&self, uri: &str) -> Result<Vec<u8>, StorageError>;

    /// Replaces the object at `uri` with `data`.
    async fn put(&self, uri: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Lists the names of the immediate sub-directories under `uri`.
    ///
    /// A missing prefix lists as empty.
    async fn list_dirs(&self, uri: &str) -> Result<Vec<String>, StorageError>;

    /// Recursively copies a local directory tree to `uri`, returning the
    /// number of files copied. The source is left untouched, and `uri`
    /// only appears once the whole tree has been copied.
    async fn put_tree(&self, source: &Path, uri: &str) -> Result<usize, StorageError>;
}

/// Filesystem backend.
///
/// Relative keys resolve under `workdir`. Remote keys resolve under
/// `remote_mount/{bucket}/{key}`, which is where an object-store mount
/// (s3fs, rclone, ...) exposes the bucket.
#[derive(Debug, Clone)]
pub struct FsBackend {
    workdir: PathBuf,
    remote_mount: Option<PathBuf>,
}

impl FsBackend {
    /// Creates a backend rooted at `workdir` with no remote mount.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            remote_mount: None,
        }
    }

    /// Sets the directory where remote buckets are mounted.
    pub fn with_remote_mount(mut self, mount: impl Into<PathBuf>) -> Self {
        self.remote_mount = Some(mount.into());
        self
    }

    /// Maps a storage key to a filesystem path.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf, StorageError> {
        if let Some(rest) = uri.strip_prefix(REMOTE_SCHEME) {
            let mount = self
                .remote_mount
                .as_ref()
                .ok_or_else(|| StorageError::UnsupportedUri(uri.to_string()))?;
            return Ok(mount.join(rest));
        }
        if uri.contains("://") {
            return Err(StorageError::UnsupportedUri(uri.to_string()));
        }
        Ok(self.workdir.join(uri))
    }
}

#[async_trait]
impl ObjectBackend for FsBackend {
    async fn get(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(uri)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::ArtifactNotFound(uri.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn put(&self, uri: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(uri)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write next to the target and rename so readers never see a partial file.
        let staging = staging_path(&path);
        fs::write(&staging, data).await?;
        fs::rename(&staging, &path).await?;

        debug!(uri, bytes = data.len(), "Wrote object");
        Ok(())
    }

    async fn list_dirs(&self, uri: &str) -> Result<Vec<String>, StorageError> {
        let path = self.resolve(uri)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    dirs.push(name.to_string());
                }
            }
        }
        Ok(dirs)
    }

    async fn put_tree(&self, source: &Path, uri: &str) -> Result<usize, StorageError> {
        if !source.is_dir() {
            return Err(StorageError::ArtifactNotFound(
                source.to_string_lossy().to_string(),
            ));
        }
        let destination = self.resolve(uri)?;
        let staging = staging_path(&destination);
        if fs::try_exists(&staging).await? {
            fs::remove_dir_all(&staging).await?;
        }

        let source = source.to_path_buf();
        let target = staging.clone();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &target))
            .await
            .map_err(io::Error::other)
            .and_then(|result| result);

        let copied = match copied {
            Ok(copied) => copied,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e.into());
            }
        };
        if let Err(e) = fs::rename(&staging, &destination).await {
            discard_staging(&staging).await;
            return Err(e.into());
        }

        debug!(uri, files = copied, "Copied directory tree");
        Ok(copied)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_os_string();
    staging.push(".partial");
    PathBuf::from(staging)
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging).await {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %staging.display(), error = %e, "Failed to remove staging directory");
        }
    }
}

fn copy_tree(source: &Path, destination: &Path) -> Result<usize, io::Error> {
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
