//! Target command - show the resolved target

use crate::cli::args::{OutputFormat, TargetCommandArgs};
use crate::config::Config;
use crate::error::ClibsResult;
use crate::ui::{self, UiContext};
use serde_json::json;

/// Execute the target command
pub async fn execute(args: TargetCommandArgs, _config: &Config) -> ClibsResult<()> {
    let target = args.target.resolve();
    let flags = target.flags();

    match args.format {
        OutputFormat::Plain => println!("{}", target.triple),
        OutputFormat::Json => {
            let value = json!({
                "platform": target.platform,
                "arch": target.arch,
                "triple": target.triple,
                "cflags": flags.cflags,
                "ldflags": flags.ldflags,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::key_value(&ctx, "platform", &target.platform);
            ui::key_value(&ctx, "arch", &target.arch);
            ui::key_value(&ctx, "triple", &target.triple);
            ui::key_value(&ctx, "cflags", &flags.cflags);
            ui::key_value(&ctx, "ldflags", &flags.ldflags);
        }
    }

    Ok(())
}
