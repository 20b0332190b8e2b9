//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// clibs - fetch, build and cache native C libraries
///
/// Resolves each library from a cached build, a prebuilt release archive or
/// a fresh source build, whichever is cheapest and still valid.
#[derive(Parser, Debug)]
#[command(name = "clibs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info and build output, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CLIBS_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build libraries, reusing caches and prebuilt archives
    Build(BuildArgs),

    /// Print the variables exported by built libraries
    Export(ExportArgs),

    /// List the libraries of the current project
    List(ListArgs),

    /// Show the resolved target triple and default flags
    Target(TargetCommandArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Target selection shared by several commands
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target platform (e.g. linux, darwin, windows, wasip1)
    #[arg(long, env = "CLIBS_TARGET_OS")]
    pub platform: Option<String>,

    /// Target architecture (e.g. amd64, arm64, wasm)
    #[arg(long, env = "CLIBS_TARGET_ARCH")]
    pub arch: Option<String>,
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Libraries to build, by module, name or directory (default: all)
    pub libs: Vec<String>,

    /// Ignore all caches and rebuild from freshly fetched source
    #[arg(short, long)]
    pub force: bool,

    /// Build into the prebuilt directory, for publishing release archives
    #[arg(short, long)]
    pub prebuilt: bool,

    /// Never use prebuilt archives
    #[arg(long)]
    pub local: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for the export command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Libraries to export (default: all)
    pub libs: Vec<String>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(short, long, default_value = "env")]
    pub format: ExportFormat,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Libraries to show (default: all)
    pub libs: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the target command
#[derive(Parser, Debug)]
pub struct TargetCommandArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

/// Output format for list and target
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Output format for export
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// KEY=VALUE lines
    Env,
    /// JSON array of {key, value}
    Json,
}
