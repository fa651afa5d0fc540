//! Pre-parsed ingestion results persisted as a single JSON file.
//!
//! Written by `tunefeed snapshot` and served by the read-only endpoints, so a
//! slow or failing upstream never blocks those requests.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ingest::{IngestFailure, IngestReport};
use super::model::{Album, Publisher};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to access snapshot '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Snapshot '{path}' is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub albums: Vec<Album>,
    pub publishers: Vec<Publisher>,
    #[serde(default)]
    pub failures: Vec<IngestFailure>,
}

impl Snapshot {
    pub fn from_report(report: IngestReport, generated_at: DateTime<Utc>) -> Self {
        let publishers = report.publishers().cloned().collect();
        let failures = report.failures.clone();
        Self {
            generated_at,
            albums: report.into_albums(),
            publishers,
            failures,
        }
    }

    /// Read a snapshot file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let content = match std::fs::read(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| SnapshotError::Json {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write the snapshot so readers only ever see the old or the new file.
    pub fn write_atomic(&self, path: &Path) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        atomic_write(path, &json).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Write-to-temp-then-rename; the destination is never left partially written.
fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    // SEC-009: Unpredictable temp name plus create_new, so a pre-planted
    // symlink at the temp path makes the write fail instead of following it
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let result = (|| {
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        temp_file.write_all(content)?;
        temp_file.sync_all()?;
        drop(temp_file);

        // On Windows, rename fails if destination exists
        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }

        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}
