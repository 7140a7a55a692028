use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;

use super::{ObjectKey, ObjectStore};
use crate::error::{Error, Result};

/// A directory tree used as an object store
///
/// Keys are paths relative to the root, joined with `/`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    name: String,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root.to_string_lossy().to_string();
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, part| path.join(part))
    }

    fn key_of(&self, path: &Path) -> Option<ObjectKey> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>();
        Some(parts.join("/"))
    }
}

impl ObjectStore for LocalStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectKey>> {
        info!("scanning {} for `{}`", self.root.display(), prefix);
        let mut keys = vec![];
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::store_access(prefix, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(key) = self.key_of(entry.path()) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.path_of(key)).await.map_err(|e| Error::store_access(key, e))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::store_write(key, e))?;
        }
        tokio::fs::write(&path, data).await.map_err(|e| Error::store_write(key, e))
    }
}
