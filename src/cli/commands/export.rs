//! Export command - print variables exported by built libraries

use crate::cli::args::{ExportArgs, ExportFormat};
use crate::config::Config;
use crate::error::ClibsResult;

/// Execute the export command.
///
/// Only the variables go to stdout so the output can be sourced or parsed.
pub async fn execute(args: ExportArgs, config: &Config) -> ClibsResult<()> {
    let libs = super::select_libs(&args.libs)?;
    let pipeline = super::system_pipeline(config, args.target.resolve());
    let vars = pipeline.export_all(&libs).await?;

    match args.format {
        ExportFormat::Env => {
            for var in &vars {
                println!("{}", var);
            }
        }
        ExportFormat::Json => println!("{}", serde_json::to_string_pretty(&vars)?),
    }

    Ok(())
}
