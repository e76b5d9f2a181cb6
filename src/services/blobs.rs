//! Blob storage collaborator: write, rename, read, delete by relative name.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File/blob store keyed by names relative to an upload root.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Atomic move from `from` to `to` (promotion of a staged image).
    async fn rename(&self, from: &str, to: &str) -> Result<PathBuf>;

    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    async fn delete(&self, name: &str) -> Result<()>;

    /// Absolute path a name resolves to (for response bodies and jobs).
    fn resolve(&self, name: &str) -> PathBuf;
}

/// Local-filesystem blob store rooted at the configured upload directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create the store, ensuring the upload directory exists.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| AppError::Storage(format!("create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        // Names come from user-supplied filenames; refuse anything that could
        // escape the upload root.
        let candidate = Path::new(name);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AppError::BadRequest(format!("invalid file name: {}", name)));
        }
        Ok(self.root.join(candidate))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<PathBuf> {
        let from_path = self.path_of(from)?;
        let to_path = self.path_of(to)?;
        tokio::fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "rename {} -> {}: {}",
                    from_path.display(),
                    to_path.display(),
                    e
                ))
            })?;
        Ok(to_path)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Storage(format!("read {}: {}", path.display(), e)))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AppError::Storage(format!("delete {}: {}", path.display(), e)))
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalBlobStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn write_rename_read_delete() {
        let (_dir, store) = store().await;

        store.write("temp_r1_a.png", b"bytes").await.unwrap();
        let final_path = store.rename("temp_r1_a.png", "r1_a.png").await.unwrap();
        assert!(final_path.ends_with("r1_a.png"));

        assert_eq!(store.read("r1_a.png").await.unwrap(), b"bytes");
        store.delete("r1_a.png").await.unwrap();
        assert!(store.read("r1_a.png").await.is_err());
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (_dir, store) = store().await;
        let err = store.write("../escape.png", b"x").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = store.read("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn missing_file_is_a_storage_error() {
        let (_dir, store) = store().await;
        let err = store.read("nope.png").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
