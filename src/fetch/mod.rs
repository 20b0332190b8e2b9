//! Source acquisition
//!
//! Populates a library's download cache from its [`Source`], all or
//! nothing: work happens in a sibling `<dir>_tmp` staging directory which
//! only replaces the real directory after everything, including the
//! download status record, succeeded. On any failure (or if the future is
//! dropped) the staging directory is removed and the previous download
//! cache is left untouched.

pub mod http;

pub use http::{Downloader, HttpDownloader};

use crate::cache::ledger::{self, Purpose};
use crate::error::{ClibsError, ClibsResult};
use crate::process::{run_tool, ProcessRunner};
use crate::spec::{FileSpec, GitSpec, Lib, Source};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Suffix for files still being transferred
const PARTIAL_SUFFIX: &str = ".download";

/// Suffix of the staging directory next to the final one
const STAGING_SUFFIX: &str = "_tmp";

/// Archive formats unpacked after download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    TarXz,
    TarBz2,
    Zip,
}

impl ArchiveKind {
    /// Detect the archive kind from a file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Tool and arguments that unpack `archive` into `dest`
    fn command<'a>(&self, archive: &'a str, dest: &'a str) -> (&'static str, Vec<&'a str>) {
        match self {
            Self::TarGz => ("tar", vec!["-xzf", archive, "-C", dest]),
            Self::TarXz => ("tar", vec!["-xJf", archive, "-C", dest]),
            Self::TarBz2 => ("tar", vec!["-xjf", archive, "-C", dest]),
            Self::Zip => ("unzip", vec!["-q", "-o", archive, "-d", dest]),
        }
    }
}

/// A staging directory that is removed unless committed
#[derive(Debug)]
pub struct Staging {
    dir: PathBuf,
    target: PathBuf,
}

impl Staging {
    /// Create a fresh `<target>_tmp`, clearing any leftover from an earlier run
    pub fn create(target: &Path) -> ClibsResult<Self> {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(STAGING_SUFFIX);
        let dir = target.with_file_name(name);

        if dir.exists() {
            debug!("Removing stale staging directory {}", dir.display());
            fs::remove_dir_all(&dir)
                .map_err(|e| ClibsError::io(format!("removing {}", dir.display()), e))?;
        }
        fs::create_dir_all(&dir)
            .map_err(|e| ClibsError::io(format!("creating {}", dir.display()), e))?;

        Ok(Self {
            dir,
            target: target.to_path_buf(),
        })
    }

    /// Staging directory to populate
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Replace the target with the whole staging directory
    pub fn commit(self) -> ClibsResult<PathBuf> {
        let payload = self.dir.clone();
        self.commit_path(&payload)
    }

    /// Replace the target with `payload`, a directory inside (or equal to)
    /// the staging directory. Anything else left in staging is discarded.
    pub fn commit_path(self, payload: &Path) -> ClibsResult<PathBuf> {
        if self.target.exists() {
            fs::remove_dir_all(&self.target).map_err(|e| {
                ClibsError::io(format!("removing old {}", self.target.display()), e)
            })?;
        }
        fs::rename(payload, &self.target).map_err(|e| {
            ClibsError::io(
                format!("moving {} to {}", payload.display(), self.target.display()),
                e,
            )
        })?;
        Ok(self.target.clone())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!("Failed to clean up {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Fetches sources with injected process and download capabilities
#[derive(Clone)]
pub struct Fetcher {
    runner: Arc<dyn ProcessRunner>,
    downloader: Arc<dyn Downloader>,
}

impl Fetcher {
    pub fn new(runner: Arc<dyn ProcessRunner>, downloader: Arc<dyn Downloader>) -> Self {
        Self { runner, downloader }
    }

    /// Materialize `lib`'s source tree into `download_dir` atomically
    pub async fn fetch_source(&self, lib: &Lib, download_dir: &Path) -> ClibsResult<()> {
        let source = lib
            .spec
            .source
            .as_ref()
            .ok_or_else(|| ClibsError::MissingSource {
                lib: lib.name().to_string(),
            })?;

        if let Some(parent) = download_dir.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClibsError::io(format!("creating {}", parent.display()), e))?;
        }

        let staging = Staging::create(download_dir)?;
        info!("Fetching {} ({}) into {}", lib.name(), source, staging.path().display());

        match source {
            Source::Git(git) => self.fetch_git(git, staging.path()).await?,
            Source::Files(files) => self.fetch_files(files, staging.path()).await?,
        }

        ledger::save(staging.path(), &lib.spec, Purpose::Download)?;
        let dir = staging.commit()?;
        info!("Source for {} ready in {}", lib.name(), dir.display());
        Ok(())
    }

    /// Clone `git.repo` into `dir` and check out the requested ref
    pub async fn fetch_git(&self, git: &GitSpec, dir: &Path) -> ClibsResult<()> {
        run_tool(&*self.runner, dir, "git", &["clone", "--", &git.repo, "."]).await?;

        if let Some(reference) = git.reference.as_deref().filter(|r| !r.is_empty()) {
            run_tool(&*self.runner, dir, "git", &["checkout", reference]).await?;
            debug!("Checked out {}", reference);
        }
        Ok(())
    }

    /// Download each file into `dir` in order, extracting archives
    pub async fn fetch_files(&self, files: &[FileSpec], dir: &Path) -> ClibsResult<()> {
        for (i, file) in files.iter().enumerate() {
            info!("Downloading ({}/{}): {}", i + 1, files.len(), file.url);
            let path = self.download_file(file, dir).await?;

            if file.no_extract {
                continue;
            }
            let Some(kind) = ArchiveKind::from_file_name(file.file_name()) else {
                debug!("{} is not an archive, keeping as-is", file.file_name());
                continue;
            };

            let extract_dir = match &file.extract_dir {
                Some(sub) => dir.join(sub),
                None => dir.to_path_buf(),
            };
            fs::create_dir_all(&extract_dir)
                .map_err(|e| ClibsError::io(format!("creating {}", extract_dir.display()), e))?;

            let dest = extract_dir.to_string_lossy();
            let (program, args) = kind.command(file.file_name(), &dest);
            run_tool(&*self.runner, dir, program, &args).await?;

            fs::remove_file(&path)
                .map_err(|e| ClibsError::io(format!("removing {}", path.display()), e))?;
            debug!("Extracted {} into {}", file.file_name(), extract_dir.display());
        }
        Ok(())
    }

    /// Download one file, renaming it into place only after a full transfer
    async fn download_file(&self, file: &FileSpec, dir: &Path) -> ClibsResult<PathBuf> {
        let name = file.file_name();
        let partial = dir.join(format!("{}{}", name, PARTIAL_SUFFIX));
        let path = dir.join(name);

        if let Err(e) = self.downloader.download(&file.url, &partial).await {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }

        fs::rename(&partial, &path).map_err(|e| {
            let _ = fs::remove_file(&partial);
            ClibsError::io(format!("moving download into {}", path.display()), e)
        })?;
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes shared by the fetch, build and pipeline tests

    use super::*;
    use crate::process::{ProcessOutput, ProcessRequest};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request; fails any request whose command line contains `fail_on`
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: Mutex<Vec<ProcessRequest>>,
        pub fail_on: Option<String>,
        pub stdout: String,
    }

    impl FakeRunner {
        pub fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: Some(pattern.to_string()),
                ..Self::default()
            }
        }

        pub fn with_stdout(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                ..Self::default()
            }
        }

        pub fn commands(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|r| r.display()).collect()
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(&self, request: &ProcessRequest) -> ClibsResult<ProcessOutput> {
            self.calls.lock().unwrap().push(request.clone());
            match &self.fail_on {
                Some(pattern) if request.display().contains(pattern.as_str()) => {
                    Ok(ProcessOutput::failed(1, "simulated failure"))
                }
                _ => Ok(ProcessOutput::ok(self.stdout.clone())),
            }
        }
    }

    /// Writes the URL as file content; fails URLs containing `fail_on`
    #[derive(Default)]
    pub struct FakeDownloader {
        pub urls: Mutex<Vec<String>>,
        pub fail_on: Option<String>,
    }

    impl FakeDownloader {
        pub fn failing_on(pattern: &str) -> Self {
            Self {
                fail_on: Some(pattern.to_string()),
                ..Self::default()
            }
        }

        pub fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Downloader for FakeDownloader {
        async fn download(&self, url: &str, dest: &Path) -> ClibsResult<u64> {
            self.urls.lock().unwrap().push(url.to_string());
            // Leave a partial file behind, like an interrupted transfer would
            fs::write(dest, url.as_bytes()).unwrap();
            match &self.fail_on {
                Some(pattern) if url.contains(pattern.as_str()) => Err(ClibsError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
                _ => Ok(url.len() as u64),
            }
        }
    }
}
