//! Blob storage for template files.
//!
//! Keys are relative paths such as `templates/<uuid>.docx`.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

#[async_trait]
pub trait ObjectStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String>;

    async fn download_file(&self, filename: &str) -> Result<Vec<u8>, String>;

    async fn delete_file(&self, filename: &str) -> Result<(), String>;
}

pub fn template_blob_key(id: &uuid::Uuid) -> String {
    format!("templates/{}.docx", id)
}

/// Blobs stored as files below a root directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, String> {
        let relative = Path::new(filename);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if filename.is_empty() || escapes {
            return Err(format!("Invalid storage key '{}'", filename));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        let path = self.resolve(filename)?;
        let data = file_data.to_vec();

        // Written to a temp file in the target directory, then renamed into place.
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let dir = path
                .parent()
                .ok_or_else(|| format!("Invalid storage path {}", path.display()))?;
            std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
            let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| e.to_string())?;
            tmp.write_all(&data).map_err(|e| e.to_string())?;
            tmp.as_file().sync_all().map_err(|e| e.to_string())?;
            tmp.persist(&path).map_err(|e| e.error.to_string())?;
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())??;

        log::info!("Stored blob {}", filename);
        Ok(())
    }

    async fn download_file(&self, filename: &str) -> Result<Vec<u8>, String> {
        let path = self.resolve(filename)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", filename, e))
    }

    async fn delete_file(&self, filename: &str) -> Result<(), String> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("Failed to delete {}: {}", filename, e)),
        }
    }
}

/// Process-local storage, used with `STORAGE_BACKEND=memory` and in tests.
#[derive(Default)]
pub struct InMemoryStorage {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.read().contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload_file(&self, filename: &str, file_data: &[u8]) -> Result<(), String> {
        self.files
            .write()
            .insert(filename.to_string(), file_data.to_vec());
        Ok(())
    }

    async fn download_file(&self, filename: &str) -> Result<Vec<u8>, String> {
        self.files
            .read()
            .get(filename)
            .cloned()
            .ok_or_else(|| format!("File not found: {}", filename))
    }

    async fn delete_file(&self, filename: &str) -> Result<(), String> {
        self.files.write().remove(filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = LocalStorage::new(dir.path());
        let key = template_blob_key(&uuid::Uuid::new_v4());

        storage
            .upload_file(&key, b"docx bytes")
            .await
            .expect("Failed to upload");
        assert_eq!(storage.download_file(&key).await.unwrap(), b"docx bytes");

        storage.delete_file(&key).await.expect("Failed to delete");
        assert!(storage.download_file(&key).await.is_err());
        // Deleting twice is not an error.
        assert!(storage.delete_file(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_local_storage_rejects_escaping_keys() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = LocalStorage::new(dir.path());

        assert!(storage.upload_file("../outside.docx", b"x").await.is_err());
        assert!(storage.upload_file("/etc/passwd", b"x").await.is_err());
        assert!(storage.download_file("").await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_storage() {
        let storage = InMemoryStorage::new();
        storage.upload_file("templates/a.docx", b"a").await.unwrap();
        assert!(storage.has_file("templates/a.docx"));
        assert_eq!(storage.len(), 1);

        storage.delete_file("templates/a.docx").await.unwrap();
        assert!(storage.is_empty());
        assert!(storage.download_file("templates/a.docx").await.is_err());
    }
}
