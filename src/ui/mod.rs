//! Terminal output for the CLI
//!
//! Interactive terminals get cliclack blocks and an indicatif progress bar;
//! pipes and CI get plain tagged lines. Machine-readable output (`--format
//! json`, `export`) bypasses this module and goes straight to stdout.

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{intro, key_value, outro_success, step_error, step_ok_detail, step_warn_hint};
pub use progress::BuildProgress;
pub use theme::{init_theme, ClibsTheme};
