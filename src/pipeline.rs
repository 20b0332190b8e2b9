//! Per-library resolution pipeline
//!
//! Each library is resolved by the first state that succeeds:
//!
//! 1. a valid cached build (skipped with `force`)
//! 2. a valid cached prebuilt, or a freshly downloaded remote prebuilt
//!    (skipped with `force` or `local_only`)
//! 3. fetch the source if its download record is stale, then build
//!
//! Libraries are processed strictly in order and the first hard failure
//! aborts the rest. A failed remote prebuilt download is not a hard
//! failure: the library falls through to fetch and build.

use crate::build::{build_env, Builder};
use crate::cache::ledger::{self, Purpose};
use crate::cache::Layout;
use crate::error::{ClibsError, ClibsResult, Stage};
use crate::export::{ExportVar, Exporter};
use crate::fetch::{Downloader, Fetcher};
use crate::prebuilt::{PrebuiltHit, PrebuiltResolver};
use crate::process::ProcessRunner;
use crate::spec::Lib;
use crate::target::Target;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where build output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// `_build/<triple>`
    #[default]
    Build,
    /// `_prebuilt/<triple>`, for producing release archives
    Prebuilt,
}

/// Caller options for a pipeline run
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Ignore every cache and fetch and build again
    pub force: bool,
    /// Never use prebuilt archives
    pub local_only: bool,
    pub output: OutputKind,
}

impl BuildOptions {
    /// Building into the prebuilt directory always builds locally
    fn skips_prebuilt(&self) -> bool {
        self.force || self.local_only || self.output == OutputKind::Prebuilt
    }
}

/// How a library was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    CachedBuild,
    CachedPrebuilt,
    DownloadedPrebuilt,
    Built,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CachedBuild => "cached build",
            Self::CachedPrebuilt => "cached prebuilt",
            Self::DownloadedPrebuilt => "downloaded prebuilt",
            Self::Built => "built",
        };
        write!(f, "{}", text)
    }
}

/// A library with its usable output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub module: String,
    pub name: String,
    pub dir: PathBuf,
    pub resolution: Resolution,
}

impl Resolved {
    fn new(lib: &Lib, dir: PathBuf, resolution: Resolution) -> Self {
        Self {
            module: lib.module.clone(),
            name: lib.name().to_string(),
            dir,
            resolution,
        }
    }
}

/// Settings that come from configuration rather than per-run flags
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub shell: String,
    /// Remote prebuilt release prefix; `None` disables remote prebuilts
    pub release_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            shell: crate::build::DEFAULT_SHELL.to_string(),
            release_url: Some(crate::prebuilt::DEFAULT_RELEASE_URL.to_string()),
        }
    }
}

/// Sequences fetch, prebuilt, build and export for a set of libraries
pub struct Pipeline {
    layout: Layout,
    target: Target,
    fetcher: Fetcher,
    builder: Builder,
    prebuilt: PrebuiltResolver,
    exporter: Exporter,
}

impl Pipeline {
    pub fn new(
        layout: Layout,
        target: Target,
        runner: Arc<dyn ProcessRunner>,
        downloader: Arc<dyn Downloader>,
        settings: PipelineSettings,
    ) -> Self {
        let fetcher = Fetcher::new(runner.clone(), downloader);
        Self {
            builder: Builder::new(runner.clone()).with_shell(&settings.shell),
            prebuilt: PrebuiltResolver::new(fetcher.clone(), settings.release_url),
            exporter: Exporter::new(runner).with_shell(&settings.shell),
            fetcher,
            layout,
            target,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Output directory for `lib` under `options`
    pub fn output_dir(&self, lib: &Lib, output: OutputKind) -> PathBuf {
        match output {
            OutputKind::Build => self.layout.build_dir(lib, &self.target),
            OutputKind::Prebuilt => self.layout.prebuilt_dir(lib, &self.target),
        }
    }

    /// Resolve every library in order, stopping at the first failure
    pub async fn resolve_all(&self, libs: &[Lib], options: BuildOptions) -> ClibsResult<Vec<Resolved>> {
        let mut resolved = Vec::with_capacity(libs.len());
        for lib in libs {
            resolved.push(self.resolve_one(lib, options).await?);
        }
        Ok(resolved)
    }

    /// Resolve a single library. Errors carry the library name and stage.
    pub async fn resolve_one(&self, lib: &Lib, options: BuildOptions) -> ClibsResult<Resolved> {
        let name = lib.name();
        let in_stage = |stage: Stage| move |e: ClibsError| e.in_dependency(name, stage);
        let output_dir = self.output_dir(lib, options.output);

        if options.force {
            debug!("Forced rebuild of {}", name);
        } else if ledger::is_valid(&output_dir, &lib.spec, Purpose::Build).map_err(in_stage(Stage::Build))? {
            info!("{}: using cached build in {}", name, output_dir.display());
            return Ok(Resolved::new(lib, output_dir, Resolution::CachedBuild));
        }

        if !options.skips_prebuilt() {
            if let Some(resolved) = self.try_prebuilt(lib).await? {
                return Ok(resolved);
            }
        }

        let download_dir = self.layout.download_dir(lib);
        let fresh = !options.force
            && ledger::is_valid(&download_dir, &lib.spec, Purpose::Download).map_err(in_stage(Stage::Fetch))?;
        if fresh {
            debug!("{}: source in {} is up to date", name, download_dir.display());
        } else {
            self.fetcher
                .fetch_source(lib, &download_dir)
                .await
                .map_err(in_stage(Stage::Fetch))?;
        }

        self.builder
            .build(lib, &self.target, &download_dir, &output_dir)
            .await
            .map_err(in_stage(Stage::Build))?;
        ledger::save(&output_dir, &lib.spec, Purpose::Build).map_err(in_stage(Stage::Commit))?;

        Ok(Resolved::new(lib, output_dir, Resolution::Built))
    }

    /// State 2: local prebuilt cache, then the remote release
    async fn try_prebuilt(&self, lib: &Lib) -> ClibsResult<Option<Resolved>> {
        let dir = self.layout.prebuilt_dir(lib, &self.target);
        match self.prebuilt.resolve(lib, &self.target, &dir).await {
            Ok(Some(PrebuiltHit::Cached)) => {
                info!("{}: using cached prebuilt in {}", lib.name(), dir.display());
                Ok(Some(Resolved::new(lib, dir, Resolution::CachedPrebuilt)))
            }
            Ok(Some(PrebuiltHit::Downloaded)) => {
                Ok(Some(Resolved::new(lib, dir, Resolution::DownloadedPrebuilt)))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_fetch_failure() => {
                warn!("{}: no prebuilt available ({}), building from source", lib.name(), e);
                Ok(None)
            }
            Err(e) => Err(e.in_dependency(lib.name(), Stage::Prebuilt)),
        }
    }

    /// Find the directory a library's output lives in without building.
    ///
    /// Prefers a valid build, then a valid prebuilt; otherwise returns the
    /// default build directory with no resolution.
    pub fn locate(&self, lib: &Lib) -> ClibsResult<(PathBuf, Option<Resolution>)> {
        let build_dir = self.layout.build_dir(lib, &self.target);
        if ledger::is_valid(&build_dir, &lib.spec, Purpose::Build)? {
            return Ok((build_dir, Some(Resolution::CachedBuild)));
        }

        let prebuilt_dir = self.layout.prebuilt_dir(lib, &self.target);
        if ledger::is_valid(&prebuilt_dir, &lib.spec, Purpose::Build)? {
            return Ok((prebuilt_dir, Some(Resolution::CachedPrebuilt)));
        }

        Ok((build_dir, None))
    }

    /// Run the export command of every library that has one, in order
    pub async fn export_all(&self, libs: &[Lib]) -> ClibsResult<Vec<ExportVar>> {
        let mut vars = Vec::new();
        for lib in libs {
            if lib.spec.export_command().is_none() {
                debug!("{} has no export command", lib.name());
                continue;
            }

            let (dir, resolution) = self
                .locate(lib)
                .map_err(|e| e.in_dependency(lib.name(), Stage::Export))?;
            if resolution.is_none() {
                warn!(
                    "{} has no valid build for {}; exporting against {}",
                    lib.name(),
                    self.target.triple,
                    dir.display()
                );
            }

            vars.extend(
                self.export_one(lib, &dir)
                    .await
                    .map_err(|e| e.in_dependency(lib.name(), Stage::Export))?,
            );
        }
        Ok(vars)
    }

    async fn export_one(&self, lib: &Lib, build_dir: &Path) -> ClibsResult<Vec<ExportVar>> {
        let download_dir = self.layout.download_dir(lib);
        let env = build_env(lib, &self.target, &download_dir, build_dir);
        self.exporter.export(lib, env).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{FakeDownloader, FakeRunner};
    use crate::spec::LibSpec;
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = r#"
name = "zlib"
version = "1.3.1"
export = "echo LIBS=-lz"

[git]
repo = "https://github.com/madler/zlib"
ref = "v1.3.1"

[build]
command = "make install"
"#;

    struct Fixture {
        root: TempDir,
        runner: Arc<FakeRunner>,
        downloader: Arc<FakeDownloader>,
        lib: Lib,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with(FakeRunner::default(), FakeDownloader::default())
        }

        fn with(runner: FakeRunner, downloader: FakeDownloader) -> Self {
            let root = TempDir::new().unwrap();
            let spec = LibSpec::parse(SPEC, Path::new("lib.toml")).unwrap();
            let lib = Lib::new("github.com/goplus/clibs/zlib", root.path().join("zlib"), spec);
            Self {
                root,
                runner: Arc::new(runner),
                downloader: Arc::new(downloader),
                lib,
            }
        }

        fn pipeline(&self, release_url: Option<&str>) -> Pipeline {
            Pipeline::new(
                Layout::new(self.root.path().join("cache")),
                Target::new("linux", "amd64"),
                self.runner.clone(),
                self.downloader.clone(),
                PipelineSettings {
                    shell: "bash".to_string(),
                    release_url: release_url.map(String::from),
                },
            )
        }

        fn seed(&self, dir: &Path, purpose: Purpose) {
            fs::create_dir_all(dir).unwrap();
            ledger::save(dir, &self.lib.spec, purpose).unwrap();
        }
    }

    #[tokio::test]
    async fn cached_build_does_no_work() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));
        let build_dir = pipeline.output_dir(&fx.lib, OutputKind::Build);
        fx.seed(&build_dir, Purpose::Build);

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::CachedBuild);
        assert_eq!(resolved.dir, build_dir);
        assert!(fx.runner.commands().is_empty());
        assert!(fx.downloader.urls().is_empty());
    }

    #[tokio::test]
    async fn cached_prebuilt_skips_build() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));
        let prebuilt_dir = pipeline.output_dir(&fx.lib, OutputKind::Prebuilt);
        fx.seed(&prebuilt_dir, Purpose::Build);

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::CachedPrebuilt);
        assert_eq!(resolved.dir, prebuilt_dir);
        assert!(fx.runner.commands().is_empty());
        assert!(fx.downloader.urls().is_empty());
    }

    #[tokio::test]
    async fn remote_prebuilt_is_downloaded() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::DownloadedPrebuilt);
        assert_eq!(fx.downloader.urls().len(), 1);
        // Only the archive extraction ran, no git and no build
        let commands = fx.runner.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("tar "));
    }

    #[tokio::test]
    async fn nothing_cached_fetches_then_builds_once() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(None);

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert_eq!(
            fx.runner.commands(),
            vec![
                "git clone -- https://github.com/madler/zlib .",
                "git checkout v1.3.1",
                "bash -e -c make install",
            ]
        );
        assert!(ledger::check_valid(&resolved.dir, &fx.lib.spec, Purpose::Build).unwrap());
        let download_dir = pipeline.layout().download_dir(&fx.lib);
        assert!(ledger::check_valid(&download_dir, &fx.lib.spec, Purpose::Download).unwrap());

        // The build runs inside the source tree with the target environment
        let calls = fx.runner.calls.lock().unwrap();
        let build = &calls[2];
        assert_eq!(build.cwd, download_dir);
        assert!(build.stream);
        assert!(build
            .env
            .contains(&("CLIBS_BUILD_TARGET".to_string(), "x86_64-unknown-linux-gnu".to_string())));
    }

    #[tokio::test]
    async fn failed_remote_prebuilt_falls_through_to_build() {
        let fx = Fixture::with(FakeRunner::default(), FakeDownloader::failing_on("zlib"));
        let pipeline = fx.pipeline(Some("https://r"));

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert_eq!(fx.downloader.urls().len(), 1);
        assert_eq!(fx.runner.commands().len(), 3);
    }

    #[tokio::test]
    async fn broken_prebuilt_archive_falls_through_to_build() {
        let fx = Fixture::with(FakeRunner::failing_on("tar "), FakeDownloader::default());
        let pipeline = fx.pipeline(Some("https://r"));

        let resolved = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert_eq!(resolved.dir, pipeline.output_dir(&fx.lib, OutputKind::Build));
        let prebuilt_dir = pipeline.output_dir(&fx.lib, OutputKind::Prebuilt);
        assert!(!prebuilt_dir.exists());
        assert_eq!(
            fx.runner.commands().last().map(String::as_str),
            Some("bash -e -c make install")
        );
    }

    #[tokio::test]
    async fn valid_download_is_not_refetched() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(None);
        fx.seed(&pipeline.layout().download_dir(&fx.lib), Purpose::Download);

        pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap();

        assert_eq!(fx.runner.commands(), vec!["bash -e -c make install"]);
    }

    #[tokio::test]
    async fn force_bypasses_every_cache() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));
        fx.seed(&pipeline.output_dir(&fx.lib, OutputKind::Build), Purpose::Build);
        fx.seed(&pipeline.output_dir(&fx.lib, OutputKind::Prebuilt), Purpose::Build);
        fx.seed(&pipeline.layout().download_dir(&fx.lib), Purpose::Download);

        let options = BuildOptions {
            force: true,
            ..BuildOptions::default()
        };
        let resolved = pipeline.resolve_one(&fx.lib, options).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert!(fx.downloader.urls().is_empty());
        assert_eq!(fx.runner.commands().len(), 3);
    }

    #[tokio::test]
    async fn failed_forced_rebuild_uncommits_previous_output() {
        let fx = Fixture::with(FakeRunner::failing_on("make"), FakeDownloader::default());
        let pipeline = fx.pipeline(None);
        let build_dir = pipeline.output_dir(&fx.lib, OutputKind::Build);
        fx.seed(&build_dir, Purpose::Build);

        let forced = BuildOptions {
            force: true,
            ..BuildOptions::default()
        };
        assert!(pipeline.resolve_one(&fx.lib, forced).await.is_err());
        assert!(!ledger::is_valid(&build_dir, &fx.lib.spec, Purpose::Build).unwrap());
        assert_eq!(pipeline.locate(&fx.lib).unwrap().1, None);

        // The next plain run has to build again rather than trust the old record
        let err = pipeline
            .resolve_one(&fx.lib, BuildOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("zlib"));
        assert_eq!(
            fx.runner.commands().last().map(String::as_str),
            Some("bash -e -c make install")
        );
    }

    #[tokio::test]
    async fn failed_forced_prebuilt_rebuild_uncommits_payload() {
        let fx = Fixture::with(FakeRunner::failing_on("make"), FakeDownloader::default());
        let pipeline = fx.pipeline(Some("https://r"));
        let prebuilt_dir = pipeline.output_dir(&fx.lib, OutputKind::Prebuilt);
        fx.seed(&prebuilt_dir, Purpose::Build);

        let options = BuildOptions {
            force: true,
            output: OutputKind::Prebuilt,
            ..BuildOptions::default()
        };
        assert!(pipeline.resolve_one(&fx.lib, options).await.is_err());
        assert!(!ledger::is_valid(&prebuilt_dir, &fx.lib.spec, Purpose::Build).unwrap());
    }

    #[tokio::test]
    async fn local_only_skips_prebuilt() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));
        fx.seed(&pipeline.output_dir(&fx.lib, OutputKind::Prebuilt), Purpose::Build);

        let options = BuildOptions {
            local_only: true,
            ..BuildOptions::default()
        };
        let resolved = pipeline.resolve_one(&fx.lib, options).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert!(fx.downloader.urls().is_empty());
    }

    #[tokio::test]
    async fn prebuilt_output_builds_into_prebuilt_dir() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(Some("https://r"));

        let options = BuildOptions {
            output: OutputKind::Prebuilt,
            ..BuildOptions::default()
        };
        let resolved = pipeline.resolve_one(&fx.lib, options).await.unwrap();

        assert_eq!(resolved.resolution, Resolution::Built);
        assert_eq!(resolved.dir, pipeline.output_dir(&fx.lib, OutputKind::Prebuilt));
        assert!(fx.downloader.urls().is_empty());

        // A second run reuses it as the cached build for that output
        let again = pipeline.resolve_one(&fx.lib, options).await.unwrap();
        assert_eq!(again.resolution, Resolution::CachedBuild);
    }

    #[tokio::test]
    async fn build_failure_names_lib_and_stage() {
        let fx = Fixture::with(FakeRunner::failing_on("make"), FakeDownloader::default());
        let pipeline = fx.pipeline(None);

        let err = pipeline.resolve_one(&fx.lib, BuildOptions::default()).await.unwrap_err();

        match &err {
            ClibsError::Dependency { name, stage, source } => {
                assert_eq!(name, "zlib");
                assert_eq!(*stage, Stage::Build);
                assert!(matches!(**source, ClibsError::BuildFailed { code: 1, .. }));
            }
            other => panic!("expected Dependency error, got {:?}", other),
        }
        assert!(!ledger::is_valid(
            &pipeline.output_dir(&fx.lib, OutputKind::Build),
            &fx.lib.spec,
            Purpose::Build
        )
        .unwrap());
    }

    #[tokio::test]
    async fn resolve_all_stops_at_first_failure() {
        let fx = Fixture::with(FakeRunner::failing_on("clone"), FakeDownloader::default());
        let pipeline = fx.pipeline(None);

        // The first lib is already built, the second needs a fetch that fails
        let first = fx.lib.clone();
        fx.seed(&pipeline.output_dir(&first, OutputKind::Build), Purpose::Build);
        let mut second = fx.lib.clone();
        second.spec.name = "second".to_string();
        let mut third = fx.lib.clone();
        third.spec.name = "third".to_string();

        let err = pipeline
            .resolve_all(&[first.clone(), second, third], BuildOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("second: fetch failed"));
        // Nothing after the failing lib was attempted
        assert_eq!(fx.runner.commands().len(), 1);
        assert!(ledger::is_valid(&pipeline.output_dir(&first, OutputKind::Build), &first.spec, Purpose::Build).unwrap());
    }

    #[tokio::test]
    async fn locate_prefers_build_then_prebuilt() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(None);
        let build_dir = pipeline.output_dir(&fx.lib, OutputKind::Build);
        let prebuilt_dir = pipeline.output_dir(&fx.lib, OutputKind::Prebuilt);

        assert_eq!(pipeline.locate(&fx.lib).unwrap(), (build_dir.clone(), None));

        fx.seed(&prebuilt_dir, Purpose::Build);
        assert_eq!(
            pipeline.locate(&fx.lib).unwrap(),
            (prebuilt_dir, Some(Resolution::CachedPrebuilt))
        );

        fx.seed(&build_dir, Purpose::Build);
        assert_eq!(
            pipeline.locate(&fx.lib).unwrap(),
            (build_dir, Some(Resolution::CachedBuild))
        );
    }

    #[tokio::test]
    async fn export_runs_in_lib_path_with_resolved_dir() {
        let fx = Fixture::with(FakeRunner::with_stdout("LIBS=-lz\nnoise\n"), FakeDownloader::default());
        let pipeline = fx.pipeline(None);
        let prebuilt_dir = pipeline.output_dir(&fx.lib, OutputKind::Prebuilt);
        fx.seed(&prebuilt_dir, Purpose::Build);

        let vars = pipeline.export_all(&[fx.lib.clone()]).await.unwrap();

        assert_eq!(vars, vec![ExportVar::new("LIBS", "-lz")]);
        let calls = fx.runner.calls.lock().unwrap();
        assert_eq!(calls[0].cwd, fx.lib.path);
        assert!(calls[0]
            .env
            .contains(&("CLIBS_BUILD_DIR".to_string(), prebuilt_dir.to_string_lossy().into_owned())));
    }
}
