//! Exported build variables
//!
//! A library's export command prints `KEY=VALUE` lines (compiler and linker
//! flags for downstream consumers). Lines that are not a pair with a
//! non-empty key and value are ignored.

use crate::build::DEFAULT_SHELL;
use crate::error::{ClibsError, ClibsResult};
use crate::process::{ProcessRequest, ProcessRunner};
use crate::spec::Lib;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One exported variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportVar {
    pub key: String,
    pub value: String,
}

impl ExportVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ExportVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Parse export command output, keeping encounter order and duplicates
pub fn parse_exports(output: &str) -> Vec<ExportVar> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());
            (!key.is_empty() && !value.is_empty()).then(|| ExportVar::new(key, value))
        })
        .collect()
}

/// Runs export commands
#[derive(Clone)]
pub struct Exporter {
    runner: Arc<dyn ProcessRunner>,
    shell: String,
}

impl Exporter {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            shell: DEFAULT_SHELL.to_string(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Run `lib`'s export command in its package directory with `env`.
    ///
    /// Libraries without an export command export nothing.
    pub async fn export(&self, lib: &Lib, env: Vec<(String, String)>) -> ClibsResult<Vec<ExportVar>> {
        let Some(command) = lib.spec.export_command() else {
            return Ok(Vec::new());
        };

        debug!("Exporting {}: {}", lib.name(), command);
        let request = ProcessRequest::new(&self.shell, &lib.path)
            .args(["-c", command])
            .envs(env);
        let output = self.runner.run(&request).await?;

        if !output.success() {
            return Err(ClibsError::ExportFailed {
                lib: lib.name().to_string(),
                code: output.exit_code(),
                output: output.error_tail(),
            });
        }

        let vars = parse_exports(&output.stdout);
        debug!("{} exported {} variable(s)", lib.name(), vars.len());
        Ok(vars)
    }
}
