//! Project manifest
//!
//! `clibs.toml` lists the native libraries a project depends on, in the
//! order they should be processed:
//!
//! ```toml
//! [[lib]]
//! module = "github.com/goplus/clibs/zlib"
//! path = "libs/zlib"
//! sum = "h1:..."
//! ```

use crate::error::{ClibsError, ClibsResult};
use crate::spec::{Lib, LIB_SPEC_FILE};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project manifest file name
pub const PROJECT_FILE: &str = "clibs.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default, rename = "lib")]
    libs: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    module: String,
    path: PathBuf,
    #[serde(default)]
    sum: Option<String>,
}

/// The libraries of one project
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    libs: Vec<Lib>,
}

impl Project {
    /// Load `clibs.toml` from `root`, parsing every listed `lib.toml`
    pub fn load(root: &Path) -> ClibsResult<Self> {
        let path = root.join(PROJECT_FILE);
        if !path.exists() {
            return Err(ClibsError::ProjectManifestNotFound(path));
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| ClibsError::io(format!("reading {}", path.display()), e))?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| ClibsError::ConfigInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let libs = manifest
            .libs
            .into_iter()
            .map(|entry| {
                let dir = root.join(&entry.path);
                Ok(Lib::load(entry.module, dir)?.with_sum(entry.sum))
            })
            .collect::<ClibsResult<Vec<_>>>()?;

        debug!("Loaded {} libraries from {}", libs.len(), path.display());
        Ok(Self {
            root: root.to_path_buf(),
            libs,
        })
    }

    /// Like [`Project::load`], but a missing manifest yields an empty project
    pub fn discover(root: &Path) -> ClibsResult<Self> {
        match Self::load(root) {
            Err(ClibsError::ProjectManifestNotFound(path)) => {
                debug!("No project manifest at {}", path.display());
                Ok(Self {
                    root: root.to_path_buf(),
                    libs: Vec::new(),
                })
            }
            other => other,
        }
    }

    /// Libraries in manifest order
    pub fn libs(&self) -> &[Lib] {
        &self.libs
    }

    /// Pick libraries by module, name or directory, in pattern order.
    ///
    /// No patterns selects the whole manifest. A directory that holds a
    /// `lib.toml` but is not listed becomes an ad-hoc library without a
    /// fingerprint.
    pub fn select(&self, patterns: &[String]) -> ClibsResult<Vec<Lib>> {
        if patterns.is_empty() {
            if self.libs.is_empty() {
                return Err(ClibsError::ProjectManifestNotFound(self.root.join(PROJECT_FILE)));
            }
            return Ok(self.libs.clone());
        }

        patterns.iter().map(|p| self.select_one(p)).collect()
    }

    fn select_one(&self, pattern: &str) -> ClibsResult<Lib> {
        let dir = self.root.join(pattern);
        let canonical = dir.canonicalize().ok();

        let listed = self.libs.iter().find(|lib| {
            lib.module == pattern
                || lib.module.rsplit('/').next() == Some(pattern)
                || lib.name() == pattern
                || (canonical.is_some() && lib.path.canonicalize().ok() == canonical)
        });
        if let Some(lib) = listed {
            return Ok(lib.clone());
        }

        if dir.join(LIB_SPEC_FILE).is_file() {
            let module = canonical
                .as_deref()
                .unwrap_or(dir.as_path())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| pattern.to_string());
            debug!("Using unlisted library directory {}", dir.display());
            return Lib::load(module, dir);
        }

        Err(ClibsError::LibNotFound(pattern.to_string()))
    }
}
