//! List command - show the project's libraries

use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::{ClibsError, ClibsResult};
use crate::project::Project;
use crate::spec::Lib;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::path::PathBuf;

/// One row of `clibs list`
#[derive(Debug, Serialize)]
struct LibSummary {
    module: String,
    name: String,
    version: String,
    path: PathBuf,
    sum: Option<String>,
    source: String,
}

impl From<&Lib> for LibSummary {
    fn from(lib: &Lib) -> Self {
        Self {
            module: lib.module.clone(),
            name: lib.name().to_string(),
            version: lib.spec.version.clone(),
            path: lib.path.clone(),
            sum: lib.sum.clone(),
            source: lib
                .spec
                .source
                .as_ref()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
        }
    }
}

/// Execute the list command
pub async fn execute(args: ListArgs, _config: &Config) -> ClibsResult<()> {
    let cwd = std::env::current_dir().map_err(|e| ClibsError::io("getting current directory", e))?;
    let project = Project::discover(&cwd)?;

    let libs = if args.libs.is_empty() {
        project.libs().to_vec()
    } else {
        project.select(&args.libs)?
    };
    let summaries: Vec<LibSummary> = libs.iter().map(LibSummary::from).collect();

    if summaries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_warn_hint(&ctx, "No libraries found", "Create a clibs.toml with [[lib]] entries");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&summaries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Plain => {
            for lib in &summaries {
                println!("{}", lib.module);
            }
        }
    }

    Ok(())
}

fn print_table(libs: &[LibSummary]) {
    println!(
        "{:<16} {:<10} {:<40} {}",
        style("NAME").bold(),
        style("VERSION").bold(),
        style("MODULE").bold(),
        style("SOURCE").bold()
    );
    println!("{}", "-".repeat(90));

    for lib in libs {
        let source = if lib.source == "none" {
            style(lib.source.clone()).yellow()
        } else {
            style(lib.source.clone()).dim()
        };
        println!("{:<16} {:<10} {:<40} {}", lib.name, lib.version, lib.module, source);
    }

    println!();
    println!("{} librar{}", libs.len(), if libs.len() == 1 { "y" } else { "ies" });
}
