//! Binary storage for uploaded images.

use shared::StudioError;
use std::fs;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

/// Object storage with public URL issuance.
pub trait BlobStore: Send + Sync {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StudioError>;

    fn remove(&self, path: &str) -> Result<(), StudioError>;

    fn public_url(&self, path: &str) -> String;
}

/// Build a unique storage key for an upload: `<uuid>/<safe filename>`.
pub fn storage_path_for(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_matches('.');
    let safe = if safe.is_empty() { "image" } else { safe };
    format!("{}/{}", Uuid::new_v4(), safe)
}

/// Blobs stored as plain files under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: &Path, public_base_url: &str) -> Result<Self, StudioError> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StudioError> {
        let rel = Path::new(path);
        let safe = !path.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StudioError::Storage(format!("invalid storage path: {}", path)));
        }
        Ok(self.root.join(rel))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StudioError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, bytes)?;
        tracing::debug!(path, size = bytes.len(), "blob stored");
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StudioError> {
        let full = self.resolve(path)?;
        fs::remove_file(&full)
            .map_err(|e| StudioError::Storage(format!("failed to remove {}: {}", path, e)))?;
        // drop the per-upload directory once it is empty
        if let Some(parent) = full.parent() {
            if parent != self.root {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path)
    }
}
