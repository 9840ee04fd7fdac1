//! Reference face descriptor files.
//!
//! One JSON-encoded [`Embedding`] per file, named by a random UUID so the
//! user-chosen student identifier never reaches the filesystem.

use crate::error::StoreError;
use rollcall_core::Embedding;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DescriptorDir {
    root: PathBuf,
}

impl DescriptorDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a new descriptor file and return its path.
    ///
    /// The file is written to a temporary name first and renamed into place.
    pub fn write(&self, embedding: &Embedding) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;

        let id = Uuid::new_v4();
        let path = self.root.join(format!("{id}.json"));
        let tmp = self.root.join(format!(".{id}.json.tmp"));

        let bytes = serde_json::to_vec(embedding).map_err(|source| StoreError::DescriptorFormat {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), dim = embedding.dim(), "descriptor written");
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> Result<Embedding, StoreError> {
        let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::DescriptorFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Best-effort removal of a superseded descriptor.
    pub fn discard(&self, path: &Path) {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %err, "could not remove old descriptor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = DescriptorDir::new(dir.path().join("descriptors"));
        let embedding = Embedding {
            values: vec![0.6, 0.8],
            model_version: Some("w600k_r50".into()),
        };

        let path = store.write(&embedding).unwrap();
        assert!(path.starts_with(store.root()));
        assert_eq!(store.read(&path).unwrap(), embedding);

        // No temp files left behind.
        let leftovers = std::fs::read_dir(store.root())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_each_write_gets_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = DescriptorDir::new(dir.path());
        let e = Embedding::new(vec![1.0]);
        assert_ne!(store.write(&e).unwrap(), store.write(&e).unwrap());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = DescriptorDir::new(dir.path()).read(&path).unwrap_err();
        assert!(matches!(err, StoreError::DescriptorFormat { .. }));
    }

    #[test]
    fn test_discard_missing_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        DescriptorDir::new(dir.path()).discard(&dir.path().join("gone.json"));
    }
}
