//! External process execution
//!
//! Build commands, export commands, git and archive tools are all opaque
//! external processes. The core only depends on [`ProcessRunner`]: a request
//! goes in, an exit code and captured output come out.

use crate::error::{ClibsError, ClibsResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// A process to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Entries layered on top of the inherited environment
    pub env: Vec<(String, String)>,
    /// Re-emit output lines through the logger while running
    pub stream: bool,
}

impl ProcessRequest {
    /// Create a request for `program` running in `cwd`
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            stream: false,
        }
    }

    /// Run `command` through `shell -e -c`
    pub fn shell(shell: &str, command: &str, cwd: impl Into<PathBuf>) -> Self {
        Self::new(shell, cwd).args(["-e", "-c", command])
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Human-readable command line for logs and errors
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, with -1 for signals
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }

    /// The useful tail of combined output for error diagnostics
    pub fn error_tail(&self) -> String {
        error_tail(&self.stdout, &self.stderr)
    }
}

/// Capability to run external processes
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run a process to completion.
    ///
    /// A non-zero exit is reported through [`ProcessOutput::code`], not as an
    /// error; errors mean the process could not be spawned or timed out.
    async fn run(&self, request: &ProcessRequest) -> ClibsResult<ProcessOutput>;
}

/// Runs processes on the host with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill processes that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn wait(request: &ProcessRequest, mut child: Child) -> ClibsResult<ProcessOutput> {
        let stream = request.stream;
        let (stdout, stderr) = collect_child_output(&mut child, &|line: &str| {
            if stream {
                info!("  | {}", line);
            }
        })
        .await;

        let status = child
            .wait()
            .await
            .map_err(|e| ClibsError::command_failed(request.display(), e))?;

        Ok(ProcessOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, request: &ProcessRequest) -> ClibsResult<ProcessOutput> {
        debug!("Executing: {} (in {})", request.display(), request.cwd.display());

        let child = Command::new(&request.program)
            .args(&request.args)
            .current_dir(&request.cwd)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClibsError::command_failed(request.display(), e))?;

        match self.timeout {
            None => Self::wait(request, child).await,
            // Dropping the future drops the child, which kills it
            Some(limit) => tokio::time::timeout(limit, Self::wait(request, child))
                .await
                .map_err(|_| ClibsError::Timeout {
                    command: request.display(),
                    secs: limit.as_secs(),
                })?,
        }
    }
}

/// Read stdout and stderr concurrently, calling `on_line` for each line.
///
/// Returns the collected (stdout, stderr) text.
async fn collect_child_output(
    child: &mut Child,
    on_line: &(dyn Fn(&str) + Send + Sync),
) -> (String, String) {
    let mut stdout_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
    let mut stderr_lines = child.stderr.take().map(|s| BufReader::new(s).lines());

    let mut stdout = String::new();
    let mut stderr = String::new();

    loop {
        tokio::select! {
            line = next_line(&mut stdout_lines), if stdout_lines.is_some() => {
                match line {
                    Some(line) => {
                        on_line(&line);
                        stdout.push_str(&line);
                        stdout.push('\n');
                    }
                    None => stdout_lines = None,
                }
            }
            line = next_line(&mut stderr_lines), if stderr_lines.is_some() => {
                match line {
                    Some(line) => {
                        on_line(&line);
                        stderr.push_str(&line);
                        stderr.push('\n');
                    }
                    None => stderr_lines = None,
                }
            }
            else => break,
        }
    }

    (stdout, stderr)
}

async fn next_line<R>(lines: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

/// Combine stdout and stderr and keep the last `ERROR_TAIL_LINES` lines
pub fn error_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run a helper tool (git, tar, unzip) and turn any failure into `FetchFailed`
pub async fn run_tool(
    runner: &dyn ProcessRunner,
    cwd: &Path,
    program: &str,
    args: &[&str],
) -> ClibsResult<ProcessOutput> {
    let request = ProcessRequest::new(program, cwd).args(args.iter().copied());
    let what = request.display();
    let output = runner
        .run(&request)
        .await
        .map_err(|e| ClibsError::fetch(&what, e.to_string()))?;

    if output.success() {
        Ok(output)
    } else {
        Err(ClibsError::fetch(
            what,
            format!("exit code {}: {}", output.exit_code(), output.error_tail()),
        ))
    }
}
