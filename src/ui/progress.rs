//! Progress over a run of libraries

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TEMPLATE: &str =
    "  {spinner:.cyan} {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}";

/// Progress bar over the libraries of one command.
///
/// Interactive terminals get an indicatif bar; otherwise each library is
/// announced on its own line.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
    total: usize,
    current: usize,
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, label: &str, total: usize) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let bar = ProgressBar::new(total as u64);
            let style = ProgressStyle::with_template(TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        Self {
            bar,
            total,
            current: 0,
        }
    }

    /// Announce the library now being processed
    pub fn start(&mut self, name: &str) {
        self.current += 1;
        match &self.bar {
            Some(bar) => bar.set_message(name.to_string()),
            None => println!(
                "{} [{}/{}] {}",
                style("...").dim(),
                self.current,
                self.total,
                name
            ),
        }
    }

    /// Mark the current library finished
    pub fn advance(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}
