//! Filesystem access for chart sources and generated files
//!
//! All paths handed to a store are relative to the repository root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Read/write access to the working tree
pub trait ArtifactStore: Send + Sync {
    /// Repository root on disk
    fn root(&self) -> &Path;

    /// Whether a file or directory exists
    ///
    /// Errors other than "not found" (e.g. permission denied) are returned,
    /// so callers can tell an unreadable entry from a missing one.
    fn exists(&self, path: &Path) -> Result<bool>;

    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write a file, creating parent directories
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Immediate subdirectories of `path`, sorted
    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Store backed by the local filesystem
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ArtifactStore for FsStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        match std::fs::metadata(self.resolve(path)) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.resolve(path))?)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(self.resolve(path))?)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, contents)?;
        Ok(())
    }

    fn list_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let base = self.resolve(path);
        let mut dirs = Vec::new();

        for entry in walkdir::WalkDir::new(&base).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
            })?;
            if entry.file_type().is_dir() {
                dirs.push(path.join(entry.file_name()));
            }
        }

        dirs.sort();
        Ok(dirs)
    }
}
