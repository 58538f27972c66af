//! Persistence adapter: scoped file access under a single project directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Filesystem capability the engine is given for one project.
///
/// All paths are relative to the project root and use `/` separators. The
/// surface is deliberately small: the engine only ever reads, writes,
/// creates directories and walks the tree. There is no delete.
pub trait ProjectFs: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> EngineResult<String>;
    /// Write full file content, creating parent directories as needed.
    fn write(&self, path: &str, content: &str) -> EngineResult<()>;
    fn create_dir_all(&self, path: &str) -> EngineResult<()>;
    /// Entry names (not paths) directly under `path`.
    fn list_dir(&self, path: &str) -> EngineResult<Vec<String>>;
    fn is_dir(&self, path: &str) -> bool;
}

pub type SharedFs = Arc<dyn ProjectFs>;

/// [`ProjectFs`] over the real filesystem, rooted at the project directory.
pub struct DiskFs {
    root: PathBuf,
}

impl DiskFs {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            return self.root.clone();
        }
        let mut resolved = self.root.clone();
        for part in path.split('/') {
            resolved.push(part);
        }
        resolved
    }
}

impl ProjectFs for DiskFs {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn read(&self, path: &str) -> EngineResult<String> {
        let resolved = self.resolve(path);
        std::fs::read_to_string(&resolved).map_err(|source| EngineError::Io {
            path: resolved,
            source,
        })
    }

    fn write(&self, path: &str, content: &str) -> EngineResult<()> {
        let resolved = self.resolve(path);
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&resolved, content).map_err(|source| EngineError::Io {
            path: resolved,
            source,
        })
    }

    fn create_dir_all(&self, path: &str) -> EngineResult<()> {
        let resolved = self.resolve(path);
        std::fs::create_dir_all(&resolved).map_err(|source| EngineError::Io {
            path: resolved,
            source,
        })
    }

    fn list_dir(&self, path: &str) -> EngineResult<Vec<String>> {
        let resolved = self.resolve(path);
        let entries = std::fs::read_dir(&resolved).map_err(|source| EngineError::Io {
            path: resolved.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| EngineError::Io {
                path: resolved.clone(),
                source,
            })?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }
}
