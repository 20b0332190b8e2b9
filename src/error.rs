//! Error types for clibs
//!
//! All modules use `ClibsResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for clibs operations
pub type ClibsResult<T> = Result<T, ClibsError>;

/// Pipeline stage a dependency failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Build,
    Prebuilt,
    Commit,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Build => "build",
            Self::Prebuilt => "prebuilt",
            Self::Commit => "commit",
            Self::Export => "export",
        };
        write!(f, "{}", name)
    }
}

/// All errors that can occur in clibs
#[derive(Error, Debug)]
pub enum ClibsError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("No source declared for {lib}: expected a [git] table or a non-empty [[files]] list")]
    MissingSource { lib: String },

    #[error("No build command declared for {lib}")]
    MissingBuildCommand { lib: String },

    #[error("Project manifest not found: {0}")]
    ProjectManifestNotFound(PathBuf),

    #[error("Library not found: {0}")]
    LibNotFound(String),

    // Acquisition errors
    #[error("Fetch failed: {what}: {reason}")]
    FetchFailed { what: String, reason: String },

    #[error("Download failed: {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Download failed: {url}: HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    // Build and export errors
    #[error("Build command failed for {lib} (exit code: {code})\n{output}")]
    BuildFailed {
        lib: String,
        code: i32,
        output: String,
    },

    #[error("Export command failed for {lib} (exit code: {code})\n{output}")]
    ExportFailed {
        lib: String,
        code: i32,
        output: String,
    },

    #[error("Command timed out after {secs}s: {command}")]
    Timeout { command: String, secs: u64 },

    // Status record errors
    #[error("Status record not found: {0}")]
    StatusNotFound(PathBuf),

    #[error("Status record corrupt at {path}: {reason}")]
    StatusCorrupt { path: PathBuf, reason: String },

    #[error("Failed to write status record {path}: {source}")]
    StatusWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Per-dependency context
    #[error("{name}: {stage} failed: {source}")]
    Dependency {
        name: String,
        stage: Stage,
        #[source]
        source: Box<ClibsError>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    User(String),
}

impl ClibsError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a fetch failure
    pub fn fetch(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Attach dependency name and pipeline stage
    pub fn in_dependency(self, name: impl Into<String>, stage: Stage) -> Self {
        Self::Dependency {
            name: name.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Status record missing or unreadable: the cache is treated as invalid
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::StatusNotFound(_) | Self::StatusCorrupt { .. })
    }

    /// Network, VCS or extraction failure
    pub fn is_fetch_failure(&self) -> bool {
        match self {
            Self::FetchFailed { .. } | Self::Download { .. } | Self::HttpStatus { .. } => true,
            Self::Dependency { source, .. } => source.is_fetch_failure(),
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ProjectManifestNotFound(_) => {
                Some("Create a clibs.toml or pass library directories explicitly")
            }
            Self::MissingBuildCommand { .. } => Some("Add a [build] command to lib.toml"),
            Self::MissingSource { .. } => Some("Add a [git] table or [[files]] entries to lib.toml"),
            Self::HttpStatus { status: 404, .. } => Some("Check the URL and version in lib.toml"),
            Self::Dependency { source, .. } => source.hint(),
            _ => None,
        }
    }
}
