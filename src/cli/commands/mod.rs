//! CLI command implementations

pub mod build;
pub mod completions;
pub mod config;
pub mod export;
pub mod list;
pub mod target;

pub use build::execute as build;
pub use completions::execute as completions;
pub use config::execute as config;
pub use export::execute as export;
pub use list::execute as list;
pub use target::execute as target;

use crate::cache::Layout;
use crate::cli::args::TargetArgs;
use crate::config::Config;
use crate::error::{ClibsError, ClibsResult};
use crate::fetch::HttpDownloader;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::process::SystemRunner;
use crate::project::Project;
use crate::spec::Lib;
use crate::target::Target;
use std::sync::Arc;

impl TargetArgs {
    /// Resolve against the host for anything not given
    pub fn resolve(&self) -> Target {
        Target::resolve(self.platform.as_deref(), self.arch.as_deref())
    }
}

/// Libraries of the project in the current directory matching `patterns`
fn select_libs(patterns: &[String]) -> ClibsResult<Vec<Lib>> {
    let cwd = std::env::current_dir().map_err(|e| ClibsError::io("getting current directory", e))?;
    Project::discover(&cwd)?.select(patterns)
}

/// Pipeline wired to the host process runner and HTTP downloader
fn system_pipeline(config: &Config, target: Target) -> Pipeline {
    let runner = SystemRunner::new().with_timeout(config.build.timeout());
    let downloader = HttpDownloader::new(config.fetch.timeout());

    Pipeline::new(
        Layout::new(config.cache.root_dir()),
        target,
        Arc::new(runner),
        Arc::new(downloader),
        PipelineSettings {
            shell: config.build.shell.clone(),
            release_url: config.prebuilt.remote_url(),
        },
    )
}
