//! Reading packaged chart archives
//!
//! `helm package` produces a `.tgz` whose top-level directory is the chart
//! name. Only reading is needed here; packaging itself is delegated to helm.

use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tar::Archive;

use crate::chart::ChartManifest;
use crate::error::{CoreError, Result};

/// Read a specific file from an archive held in memory
pub fn read_file_from_archive(data: &[u8], file_path: &str) -> Result<Vec<u8>> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        if path == file_path {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {}", file_path),
    })
}

/// Read the top-level `Chart.yaml` of a packaged chart
///
/// Subchart manifests (`<chart>/charts/<dep>/Chart.yaml`) are ignored.
pub fn read_chart_manifest(data: &[u8], manifest_file: &str) -> Result<ChartManifest> {
    let decoder = GzDecoder::new(data);
    let mut archive = Archive::new(decoder);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();

        let Some((_, file)) = path.split_once('/') else {
            continue;
        };
        if file != manifest_file {
            continue;
        }

        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        return ChartManifest::from_yaml(&content, Path::new(&path));
    }

    Err(CoreError::Archive {
        message: format!("No top-level {} in archive", manifest_file),
    })
}
