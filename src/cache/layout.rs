//! Cache directory layout
//!
//! Libraries without a content fingerprint cache next to their `lib.toml`.
//! With a fingerprint, the cache lives under the shared cache root at
//! `<root>/<module>/<fingerprint>`, so every checkout of the same pinned
//! version reuses one cache. Nothing here touches the filesystem.

use crate::spec::Lib;
use crate::target::Target;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Source tree directory name
pub const DOWNLOAD_DIR: &str = "_download";
/// Local build output directory name
pub const BUILD_DIR: &str = "_build";
/// Prebuilt archive directory name
pub const PREBUILT_DIR: &str = "_prebuilt";

/// Kind of cache directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirKind {
    Download,
    Build,
    Prebuilt,
}

impl DirKind {
    /// Directory name under the library's base directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Download => DOWNLOAD_DIR,
            Self::Build => BUILD_DIR,
            Self::Prebuilt => PREBUILT_DIR,
        }
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Download => "download",
            Self::Build => "build",
            Self::Prebuilt => "prebuilt",
        };
        write!(f, "{}", name)
    }
}

/// Path computation for a shared cache root
#[derive(Debug, Clone)]
pub struct Layout {
    cache_root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `cache_root`
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    /// Base directory holding all of a library's caches
    pub fn base_dir(&self, lib: &Lib) -> PathBuf {
        match &lib.sum {
            None => lib.path.clone(),
            Some(sum) => {
                let mut dir = self.cache_root.clone();
                for segment in safe_segments(&lib.module) {
                    dir.push(segment);
                }
                dir.push(sum_dir_name(sum));
                dir
            }
        }
    }

    /// Final directory for `kind`; download caches are target independent
    pub fn dir(&self, lib: &Lib, kind: DirKind, target: &Target) -> PathBuf {
        let dir = self.base_dir(lib).join(kind.dir_name());
        match kind {
            DirKind::Download => dir,
            DirKind::Build | DirKind::Prebuilt => dir.join(&target.triple),
        }
    }

    /// Source tree directory
    pub fn download_dir(&self, lib: &Lib) -> PathBuf {
        self.base_dir(lib).join(DOWNLOAD_DIR)
    }

    /// Local build output for `target`
    pub fn build_dir(&self, lib: &Lib, target: &Target) -> PathBuf {
        self.dir(lib, DirKind::Build, target)
    }

    /// Prebuilt output for `target`
    pub fn prebuilt_dir(&self, lib: &Lib, target: &Target) -> PathBuf {
        self.dir(lib, DirKind::Prebuilt, target)
    }
}

/// Module path segments, dropping anything that could escape the cache root
fn safe_segments(module: &str) -> impl Iterator<Item = &str> {
    Path::new(module).components().filter_map(|c| match c {
        Component::Normal(s) => s.to_str(),
        _ => None,
    })
}

/// Directory name for a fingerprint such as `h1:AbC/dE+f=`
fn sum_dir_name(sum: &str) -> String {
    sum.strip_prefix("h1:").unwrap_or(sum).replace(['/', '\\'], "_")
}
