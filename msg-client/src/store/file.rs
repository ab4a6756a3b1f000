//! File-backed key-value store.
//!
//! One file per key inside a directory. Each write goes to its own
//! temporary file that is synced and then renamed over the target, so a
//! crash leaves either the old value or the new one, and concurrent writers
//! of the same key never share a temporary file.

use super::{KeyValueStore, StoreError};
use async_trait::async_trait;
use cloudmsg_core::StoreKey;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Key-value store writing one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store values under `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the value files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: StoreKey) -> PathBuf {
        self.dir.join(format!("{}.msgpack", key.as_str()))
    }
}

fn io_error(key: StoreKey) -> impl FnOnce(std::io::Error) -> StoreError {
    move |source| StoreError::Io {
        key: key.as_str(),
        source,
    }
}

async fn write_synced(path: &Path, value: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(value).await?;
    file.sync_all().await
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(key)(e)),
        }
    }

    async fn set(&self, key: StoreKey, value: Vec<u8>) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(key))?;

        let target = self.path_for(key);
        let tmp = self.dir.join(format!(
            "{}.{}.tmp",
            key.as_str(),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(e) = write_synced(&tmp, &value).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(key)(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(key)(e));
        }
        tracing::debug!("Wrote {} ({} bytes)", key.as_str(), value.len());
        Ok(())
    }

    async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(key)(e)),
        }
    }
}
