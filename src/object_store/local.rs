use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{ObjectReader, ObjectStore, ObjectStoreError};

/// Local filesystem object store: one file per key directly under `base_path`.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    /// Resolve a key to a path, refusing anything that is not a single plain
    /// path component.
    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !key.contains('\\') => {
                Ok(self.base_path.join(key))
            }
            _ => Err(ObjectStoreError::InvalidKey(key.to_string())),
        }
    }
}

fn not_found_or_io(key: &str, e: std::io::Error) -> ObjectStoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ObjectStoreError::NotFound(key.to_string())
    } else {
        ObjectStoreError::Io(e)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<u64, ObjectStoreError> {
        let path = self.object_path(key)?;

        // Write to a dot-prefixed temp file, then rename into place. Sanitized
        // keys never start with a dot, so temp files cannot shadow real objects.
        let temp_path = self
            .base_path
            .join(format!(".{key}.tmp.{}", uuid::Uuid::new_v4()));
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            let written = file.metadata().await?.len();
            fs::rename(&temp_path, &path).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match written {
            Ok(n) => Ok(n),
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(ObjectStoreError::Io(e))
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        let data = fs::read(&path).await.map_err(|e| not_found_or_io(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn open(&self, key: &str) -> Result<(ObjectReader, u64), ObjectStoreError> {
        let path = self.object_path(key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        let len = file.metadata().await?.len();
        Ok((Box::new(file), len))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Io(e)),
        }
    }
}
