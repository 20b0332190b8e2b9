//! Fingerprints and status records
//!
//! A status record is a small JSON file (`fingerprint`, `timestamp`) stored
//! inside a cache directory once its contents are complete. The fingerprint
//! is a SHA256 over the canonical JSON form of the specification, with the
//! build and export commands removed for the download purpose.

use crate::error::{ClibsError, ClibsResult};
use crate::spec::LibSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Status record file name inside every cache directory
pub const STATUS_FILE: &str = ".clibs-status.json";

/// Which part of the specification a fingerprint covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// Source acquisition only
    Download,
    /// Everything, including build and export commands
    Build,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Build => write!(f, "build"),
        }
    }
}

/// Commit marker stored in a cache directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
}

/// Path of the status record inside `dir`
pub fn status_path(dir: &Path) -> PathBuf {
    dir.join(STATUS_FILE)
}

/// Fingerprint of `spec` for `purpose`
pub fn compute_hash(spec: &LibSpec, purpose: Purpose) -> ClibsResult<String> {
    let relevant = match purpose {
        Purpose::Download => spec.download_view(),
        Purpose::Build => spec.clone(),
    };

    // Round-trip through Value so object keys come out sorted
    let canonical = serde_json::to_value(&relevant)?;
    let bytes = serde_json::to_vec(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Read the status record stored in `dir`
pub fn read_record(dir: &Path) -> ClibsResult<StatusRecord> {
    let path = status_path(dir);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ClibsError::StatusNotFound(path));
        }
        Err(e) => {
            return Err(ClibsError::StatusCorrupt {
                path,
                reason: e.to_string(),
            });
        }
    };

    serde_json::from_str(&content).map_err(|e| ClibsError::StatusCorrupt {
        path,
        reason: e.to_string(),
    })
}

/// Whether `dir` holds a record matching the current fingerprint.
///
/// A missing record is `StatusNotFound`, an unreadable one `StatusCorrupt`;
/// a readable record with another fingerprint is `Ok(false)`.
pub fn check_valid(dir: &Path, spec: &LibSpec, purpose: Purpose) -> ClibsResult<bool> {
    let record = read_record(dir)?;
    let expected = compute_hash(spec, purpose)?;
    let matched = record.fingerprint == expected;
    debug!(
        "{} record in {}: matched={} (recorded {}, expected {})",
        purpose,
        dir.display(),
        matched,
        record.fingerprint,
        expected
    );
    Ok(matched)
}

/// Like [`check_valid`], collapsing a missing or unreadable record to `false`
pub fn is_valid(dir: &Path, spec: &LibSpec, purpose: Purpose) -> ClibsResult<bool> {
    match check_valid(dir, spec, purpose) {
        Ok(matched) => Ok(matched),
        Err(e) if e.is_cache_miss() => {
            debug!("No usable {} record: {}", purpose, e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Write the status record for `purpose` into `dir`, replacing any prior one.
///
/// Only call once the directory contents are complete.
pub fn save(dir: &Path, spec: &LibSpec, purpose: Purpose) -> ClibsResult<()> {
    let record = StatusRecord {
        fingerprint: compute_hash(spec, purpose)?,
        timestamp: Utc::now(),
    };
    let content = serde_json::to_string_pretty(&record)?;

    let path = status_path(dir);
    let staging = dir.join(format!("{}.tmp", STATUS_FILE));
    let write_err = |source| ClibsError::StatusWrite {
        path: path.clone(),
        source,
    };

    fs::write(&staging, content).map_err(write_err)?;
    fs::rename(&staging, &path).map_err(write_err)?;

    debug!("Saved {} record to {}", purpose, path.display());
    Ok(())
}

/// Remove the status record from `dir` so its contents no longer count as
/// committed. A missing record is fine.
pub fn invalidate(dir: &Path) -> ClibsResult<()> {
    let path = status_path(dir);
    match fs::remove_file(&path) {
        Ok(()) => {
            debug!("Invalidated {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ClibsError::StatusWrite { path, source }),
    }
}
