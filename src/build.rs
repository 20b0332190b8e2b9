//! Build execution
//!
//! Runs a library's build command against its fetched source tree. The
//! command gets the target description through `CLIBS_*` environment
//! variables layered on top of the inherited environment.

use crate::cache::ledger::{self, Purpose};
use crate::error::{ClibsError, ClibsResult};
use crate::process::{ProcessRequest, ProcessRunner};
use crate::spec::Lib;
use crate::target::Target;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default shell for build and export commands
pub const DEFAULT_SHELL: &str = "bash";

/// Directory holding the library's `lib.toml`
pub const ENV_PACKAGE_DIR: &str = "CLIBS_PACKAGE_DIR";
/// Fetched source tree
pub const ENV_DOWNLOAD_DIR: &str = "CLIBS_DOWNLOAD_DIR";
pub const ENV_BUILD_PLATFORM: &str = "CLIBS_BUILD_PLATFORM";
pub const ENV_BUILD_ARCH: &str = "CLIBS_BUILD_ARCH";
pub const ENV_BUILD_TARGET: &str = "CLIBS_BUILD_TARGET";
pub const ENV_BUILD_CFLAGS: &str = "CLIBS_BUILD_CFLAGS";
pub const ENV_BUILD_LDFLAGS: &str = "CLIBS_BUILD_LDFLAGS";
/// Output directory the command installs into
pub const ENV_BUILD_DIR: &str = "CLIBS_BUILD_DIR";

/// Environment entries exposed to build and export commands
pub fn build_env(
    lib: &Lib,
    target: &Target,
    download_dir: &Path,
    build_dir: &Path,
) -> Vec<(String, String)> {
    let flags = target.flags();
    let path = |p: &Path| p.to_string_lossy().into_owned();

    vec![
        (ENV_PACKAGE_DIR.to_string(), path(&lib.path)),
        (ENV_DOWNLOAD_DIR.to_string(), path(download_dir)),
        (ENV_BUILD_PLATFORM.to_string(), target.platform.clone()),
        (ENV_BUILD_ARCH.to_string(), target.arch.clone()),
        (ENV_BUILD_TARGET.to_string(), target.triple.clone()),
        (ENV_BUILD_CFLAGS.to_string(), flags.cflags),
        (ENV_BUILD_LDFLAGS.to_string(), flags.ldflags),
        (ENV_BUILD_DIR.to_string(), path(build_dir)),
    ]
}

/// Executes build commands
#[derive(Clone)]
pub struct Builder {
    runner: Arc<dyn ProcessRunner>,
    shell: String,
}

impl Builder {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    /// Use a different shell to interpret build commands
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Build `lib` from `download_dir` into `build_dir`.
    ///
    /// Any previous build record is dropped first. On failure the output
    /// directory is left as the command left it and no build record is
    /// written.
    pub async fn build(
        &self,
        lib: &Lib,
        target: &Target,
        download_dir: &Path,
        build_dir: &Path,
    ) -> ClibsResult<()> {
        fs::create_dir_all(build_dir)
            .map_err(|e| ClibsError::io(format!("creating {}", build_dir.display()), e))?;
        // Whatever was committed here before is about to be overwritten
        ledger::invalidate(build_dir)?;

        let command = lib
            .spec
            .build_command()
            .ok_or_else(|| ClibsError::MissingBuildCommand {
                lib: lib.name().to_string(),
            })?;

        info!("Building {} for {}", lib.name(), target.triple);
        debug!("Build command: {}", command);

        let request = ProcessRequest::shell(&self.shell, command, download_dir)
            .envs(build_env(lib, target, download_dir, build_dir))
            .streaming(true);
        let output = self.runner.run(&request).await?;

        if !output.success() {
            return Err(ClibsError::BuildFailed {
                lib: lib.name().to_string(),
                code: output.exit_code(),
                output: output.error_tail(),
            });
        }

        ledger::save(build_dir, &lib.spec, Purpose::Build)?;
        info!("Built {} into {}", lib.name(), build_dir.display());
        Ok(())
    }
}
