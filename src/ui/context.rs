//! Terminal detection for choosing between fancy and plain output

use std::io::IsTerminal;

/// CI systems that set their own marker variable
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// Decides how progress and results are rendered
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Fancy output only on an interactive terminal outside CI
    pub fn detect() -> Self {
        Self {
            fancy: Self::terminal_is_interactive(),
        }
    }

    /// Plain line-oriented output
    pub fn plain() -> Self {
        Self { fancy: false }
    }

    /// Whether spinners, bars and cliclack blocks are used
    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }

    fn terminal_is_interactive() -> bool {
        if !std::io::stdout().is_terminal() || !std::io::stderr().is_terminal() {
            return false;
        }
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        !CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some())
    }
}
