use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::FileStore;

/// Filesystem-backed file store rooted at an upload directory. Paths are
/// relative to the root; absolute paths and traversals are rejected before
/// touching the filesystem.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        if Path::new(path).is_absolute() {
            return Err(StoreError::InvalidPath(format!(
                "absolute path not allowed: {}",
                path
            )));
        }
        if path.contains("..") {
            return Err(StoreError::InvalidPath(format!(
                "path traversal not allowed: {}",
                path
            )));
        }

        Ok(self.root.join(path))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn get_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let full_path = self.resolve(path)?;

        tokio::fs::read(&full_path)
            .await
            .map_err(|e| StoreError::ReadFile {
                path: full_path,
                source: e,
            })
    }
}
