//! Library build specification
//!
//! Each native library ships a `lib.toml` describing where its source comes
//! from and how to build and export it. The two source kinds (git checkout
//! and a list of downloaded files) are mutually exclusive and modelled as
//! the [`Source`] enum.

use crate::error::{ClibsError, ClibsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Fixed file name of the per-library specification
pub const LIB_SPEC_FILE: &str = "lib.toml";

/// Git checkout source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSpec {
    /// Repository URL
    pub repo: String,

    /// Branch, tag or commit to check out after cloning
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// A single file to download into the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileSpec {
    pub url: String,

    /// Keep the downloaded file as-is instead of unpacking it
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_extract: bool,

    /// Subdirectory (relative to the source root) to unpack into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_dir: Option<String>,
}

impl FileSpec {
    /// Create a file spec that is downloaded and extracted into the root
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            no_extract: false,
            extract_dir: None,
        }
    }

    /// Last path segment of the URL, used as the on-disk file name
    pub fn file_name(&self) -> &str {
        let path = self.url.split(['?', '#']).next().unwrap_or(&self.url);
        path.rsplit('/').next().unwrap_or(path)
    }
}

/// Where a library's source tree comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Git(GitSpec),
    Files(Vec<FileSpec>),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(git) => match &git.reference {
                Some(reference) => write!(f, "git {}@{}", git.repo, reference),
                None => write!(f, "git {}", git.repo),
            },
            Self::Files(files) => write!(f, "{} file(s)", files.len()),
        }
    }
}

/// Build recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Shell command run in the download directory
    #[serde(default)]
    pub command: String,
}

/// Parsed `lib.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLibSpec", into = "RawLibSpec")]
pub struct LibSpec {
    pub name: String,
    pub version: String,
    pub source: Option<Source>,
    pub build: Option<BuildSpec>,
    /// Shell command printing `KEY=VALUE` lines
    pub export: Option<String>,
}

/// On-disk layout of `lib.toml`, also the canonical hashing form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLibSpec {
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    files: Vec<FileSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TryFrom<RawLibSpec> for LibSpec {
    type Error = String;

    fn try_from(raw: RawLibSpec) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }

        let source = match (raw.git, raw.files.is_empty()) {
            (Some(_), false) => {
                return Err("git and files are mutually exclusive".to_string());
            }
            (Some(git), true) => {
                if git.repo.trim().is_empty() {
                    return Err("git.repo must not be empty".to_string());
                }
                Some(Source::Git(git))
            }
            (None, false) => {
                for (i, file) in raw.files.iter().enumerate() {
                    validate_file(i, file)?;
                }
                Some(Source::Files(raw.files))
            }
            (None, true) => None,
        };

        Ok(Self {
            name: raw.name,
            version: raw.version,
            source,
            build: raw.build,
            export: raw.export.filter(|e| !e.trim().is_empty()),
        })
    }
}

impl From<LibSpec> for RawLibSpec {
    fn from(spec: LibSpec) -> Self {
        let (git, files) = match spec.source {
            Some(Source::Git(git)) => (Some(git), Vec::new()),
            Some(Source::Files(files)) => (None, files),
            None => (None, Vec::new()),
        };
        Self {
            name: spec.name,
            version: spec.version,
            git,
            files,
            build: spec.build,
            export: spec.export,
        }
    }
}

fn validate_file(index: usize, file: &FileSpec) -> Result<(), String> {
    if file.url.trim().is_empty() || file.file_name().is_empty() {
        return Err(format!("files[{}].url must name a file", index));
    }
    if let Some(dir) = &file.extract_dir {
        let escapes = Path::new(dir)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(format!(
                "files[{}].extract-dir '{}' must be a relative path inside the source tree",
                index, dir
            ));
        }
    }
    Ok(())
}

impl LibSpec {
    /// Parse a specification from TOML text
    pub fn parse(content: &str, origin: &Path) -> ClibsResult<Self> {
        toml::from_str(content).map_err(|e| ClibsError::ConfigInvalid {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read `lib.toml` from a library directory
    pub fn from_dir(dir: &Path) -> ClibsResult<Self> {
        let path = dir.join(LIB_SPEC_FILE);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ClibsError::io(format!("reading {}", path.display()), e))?;
        Self::parse(&content, &path)
    }

    /// The non-empty build command, if any
    pub fn build_command(&self) -> Option<&str> {
        self.build
            .as_ref()
            .map(|b| b.command.as_str())
            .filter(|c| !c.trim().is_empty())
    }

    /// The export command, if any
    pub fn export_command(&self) -> Option<&str> {
        self.export.as_deref()
    }

    /// Copy of this spec without the fields that only affect building
    pub fn download_view(&self) -> Self {
        Self {
            build: None,
            export: None,
            ..self.clone()
        }
    }
}

/// One native library dependency to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lib {
    /// Stable module identifier (e.g. `github.com/goplus/clibs/zlib`)
    pub module: String,

    /// Directory holding `lib.toml`
    pub path: PathBuf,

    /// Content fingerprint of the pinned version, when the host ecosystem has one
    pub sum: Option<String>,

    pub spec: LibSpec,
}

impl Lib {
    /// Create a descriptor from an already parsed spec
    pub fn new(module: impl Into<String>, path: impl Into<PathBuf>, spec: LibSpec) -> Self {
        Self {
            module: module.into(),
            path: path.into(),
            sum: None,
            spec,
        }
    }

    /// Set the content fingerprint
    pub fn with_sum(mut self, sum: Option<String>) -> Self {
        self.sum = sum.filter(|s| !s.trim().is_empty());
        self
    }

    /// Load a descriptor by reading `lib.toml` from `path`
    pub fn load(module: impl Into<String>, path: impl Into<PathBuf>) -> ClibsResult<Self> {
        let path = path.into();
        let spec = LibSpec::from_dir(&path)?;
        Ok(Self::new(module, path, spec))
    }

    /// Library name from its spec
    pub fn name(&self) -> &str {
        &self.spec.name
    }
}
