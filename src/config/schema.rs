//! Configuration schema for clibs
//!
//! Configuration is stored at `~/.config/clibs/config.toml`

use crate::build::DEFAULT_SHELL;
use crate::prebuilt::DEFAULT_RELEASE_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Shared cache settings
    pub cache: CacheConfig,

    /// Prebuilt release settings
    pub prebuilt: PrebuiltConfig,

    /// Source download settings
    pub fetch: FetchConfig,

    /// Build and export command settings
    pub build: BuildConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

impl GeneralConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Shared cache configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root for libraries pinned by a content fingerprint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl CacheConfig {
    /// Configured root, or `~/.clibs/build`
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".clibs")
                .join("build")
        })
    }
}

/// Prebuilt release configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrebuiltConfig {
    /// Try prebuilt archives before building from source
    pub enabled: bool,

    /// Release URL prefix; empty disables remote downloads
    pub release_url: String,
}

impl Default for PrebuiltConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            release_url: DEFAULT_RELEASE_URL.to_string(),
        }
    }
}

impl PrebuiltConfig {
    /// Release prefix to download from, if remote prebuilts are on
    pub fn remote_url(&self) -> Option<String> {
        let url = self.release_url.trim();
        (self.enabled && !url.is_empty()).then(|| url.to_string())
    }
}

/// Source download configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-transfer timeout per file in seconds (0 = none)
    pub timeout_secs: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        secs(self.timeout_secs)
    }
}

/// Build command configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Shell used for build and export commands
    pub shell: String,

    /// Per-command timeout in seconds (0 = none)
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            timeout_secs: 0,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Option<Duration> {
        secs(self.timeout_secs)
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}
