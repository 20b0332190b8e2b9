//! Prebuilt release archives
//!
//! A library can be satisfied by a release archive published per target
//! triple at `<prefix>/<name%2Fversion>/<name>-<version>-<triple>.tar.gz`.
//! Archives either contain a top-level `<triple>/` directory or the build
//! output directly; both unpack into `_prebuilt/<triple>`.

use crate::cache::ledger::{self, Purpose};
use crate::error::{ClibsError, ClibsResult};
use crate::fetch::{Fetcher, Staging};
use crate::spec::{FileSpec, Lib};
use crate::target::Target;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Default release location for prebuilt archives
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/cpunion/clibs/releases/download";

/// URL of the prebuilt archive for a library version and triple
pub fn prebuilt_url(prefix: &str, name: &str, version: &str, triple: &str) -> String {
    format!(
        "{}/{}/{}-{}-{}.tar.gz",
        prefix.trim_end_matches('/'),
        path_escape(&format!("{}/{}", name, version)),
        name,
        version,
        triple
    )
}

/// Escape a string for use as a single URL path segment
fn path_escape(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        let keep = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'~' | b'$' | b'&' | b'+' | b':' | b'=' | b'@');
        if keep {
            escaped.push(byte as char);
        } else {
            let _ = write!(escaped, "%{:02X}", byte);
        }
    }
    escaped
}

/// How a prebuilt directory was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrebuiltHit {
    /// Already unpacked with a matching build record
    Cached,
    /// Downloaded and unpacked just now
    Downloaded,
}

/// Resolves libraries from the local prebuilt cache or remote releases
#[derive(Clone)]
pub struct PrebuiltResolver {
    fetcher: Fetcher,
    release_url: Option<String>,
}

impl PrebuiltResolver {
    /// Create a resolver; an empty release URL disables remote downloads
    pub fn new(fetcher: Fetcher, release_url: Option<String>) -> Self {
        Self {
            fetcher,
            release_url: release_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Archive URL for `lib` on `target`, if remote downloads are configured
    pub fn url_for(&self, lib: &Lib, target: &Target) -> Option<String> {
        self.release_url.as_deref().map(|prefix| {
            prebuilt_url(prefix, lib.name(), &lib.spec.version, &target.triple)
        })
    }

    /// Satisfy `dir` from the local cache, then from the remote release.
    ///
    /// Returns `Ok(None)` when the cache is stale and no release URL is set.
    pub async fn resolve(
        &self,
        lib: &Lib,
        target: &Target,
        dir: &Path,
    ) -> ClibsResult<Option<PrebuiltHit>> {
        if ledger::is_valid(dir, &lib.spec, Purpose::Build)? {
            debug!("Prebuilt cache for {} is valid", lib.name());
            return Ok(Some(PrebuiltHit::Cached));
        }

        let Some(url) = self.url_for(lib, target) else {
            debug!("Remote prebuilt disabled, skipping {}", lib.name());
            return Ok(None);
        };

        self.download(lib, target, &url, dir).await?;
        Ok(Some(PrebuiltHit::Downloaded))
    }

    /// Download and unpack the archive at `url` into `dir` atomically
    async fn download(&self, lib: &Lib, target: &Target, url: &str, dir: &Path) -> ClibsResult<()> {
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClibsError::io(format!("creating {}", parent.display()), e))?;
        }

        info!("Fetching prebuilt {} from {}", lib.name(), url);
        let staging = Staging::create(dir)?;
        self.fetcher
            .fetch_files(&[FileSpec::new(url)], staging.path())
            .await?;

        let nested = staging.path().join(&target.triple);
        let payload = if nested.is_dir() {
            nested
        } else {
            staging.path().to_path_buf()
        };

        ledger::save(&payload, &lib.spec, Purpose::Build)?;
        staging.commit_path(&payload)?;
        info!("Prebuilt {} ready in {}", lib.name(), dir.display());
        Ok(())
    }
}
