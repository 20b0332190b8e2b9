//! Build command - resolve every selected library

use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::ClibsResult;
use crate::pipeline::{BuildOptions, OutputKind};
use crate::ui::{self, BuildProgress, UiContext};
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> ClibsResult<()> {
    let ctx = UiContext::detect();
    let libs = super::select_libs(&args.libs)?;
    let target = args.target.resolve();

    let options = BuildOptions {
        force: args.force,
        local_only: args.local || !config.prebuilt.enabled,
        output: if args.prebuilt {
            OutputKind::Prebuilt
        } else {
            OutputKind::Build
        },
    };
    debug!("Build options: {:?}", options);

    let pipeline = super::system_pipeline(config, target);
    ui::intro(
        &ctx,
        &format!("Building {} librar{} for {}", libs.len(), plural(libs.len()), pipeline.target()),
    );

    let mut progress = BuildProgress::new(&ctx, "Building", libs.len());
    let mut resolved = Vec::with_capacity(libs.len());
    for lib in &libs {
        progress.start(lib.name());
        match pipeline.resolve_one(lib, options).await {
            Ok(r) => {
                progress.advance();
                resolved.push(r);
            }
            Err(e) => {
                progress.finish();
                ui::step_error(&ctx, lib.name());
                return Err(e);
            }
        }
    }
    progress.finish();

    for r in &resolved {
        ui::step_ok_detail(
            &ctx,
            &format!("{} ({})", r.name, r.resolution),
            &r.dir.display().to_string(),
        );
    }
    ui::outro_success(&ctx, "All libraries ready");
    Ok(())
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
