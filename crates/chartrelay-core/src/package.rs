//! Packaged chart archives

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::chart::ChartKind;
use crate::error::{CoreError, Result};

/// Extension of archives produced by `helm package`
pub const PACKAGE_EXTENSION: &str = ".tgz";

/// Separator between chart name and version in archive names
pub const PACKAGE_VERSION_SEPARATOR: char = '-';

/// A packaged chart archive on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// `<name>-<version>.tgz`
    pub source_file_name: String,
    pub name: String,
    pub version: String,
    pub kind: ChartKind,
    pub file_path: PathBuf,
}

impl Package {
    /// Build a package from an archive path, recovering name and version from the file name
    pub fn from_path(path: &Path, kind: ChartKind) -> Result<Self> {
        let source_file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| CoreError::InvalidPackageName {
                name: path.display().to_string(),
            })?;

        let (name, version) = Self::parse_file_name(&source_file_name).ok_or_else(|| {
            CoreError::InvalidPackageName {
                name: source_file_name.clone(),
            }
        })?;
        let (name, version) = (name.to_string(), version.to_string());

        Ok(Self {
            source_file_name,
            name,
            version,
            kind,
            file_path: path.to_path_buf(),
        })
    }

    /// Archive file name for a chart name and version
    pub fn file_name_for(name: &str, version: &str) -> String {
        format!("{}{}{}{}", name, PACKAGE_VERSION_SEPARATOR, version, PACKAGE_EXTENSION)
    }

    /// Split `<name>-<version>.tgz` into `(name, version)`
    ///
    /// Splits at the last separator, so hyphenated chart names survive.
    /// Versions must not contain the separator.
    pub fn parse_file_name(file_name: &str) -> Option<(&str, &str)> {
        let stem = file_name.strip_suffix(PACKAGE_EXTENSION)?;
        let (name, version) = stem.rsplit_once(PACKAGE_VERSION_SEPARATOR)?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some((name, version))
    }

    /// SHA256 of the archive, hex encoded
    pub fn digest(&self) -> Result<String> {
        let data = std::fs::read(&self.file_path)?;
        Ok(sha256_hex(&data))
    }

    /// Read the archive bytes
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(&self.file_path)?)
    }
}

/// Compute the hex SHA256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
