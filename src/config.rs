use crate::domain::context::DEFAULT_PATCH_INDICATOR;
use crate::domain::Target;
use crate::error::{RelgateError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "relgate.toml";

/// Represents the complete configuration for relgate.
///
/// Every section is optional in the file; missing values fall back to defaults.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub version: VersionConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub release: ReleaseConfig,
}

fn default_patch_indicator() -> String {
    DEFAULT_PATCH_INDICATOR.to_string()
}

/// Version resolution defaults, overridable per invocation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VersionConfig {
    #[serde(default = "default_patch_indicator")]
    pub patch_indicator: String,

    #[serde(default)]
    pub exclude_v: bool,
}

impl Default for VersionConfig {
    fn default() -> Self {
        VersionConfig {
            patch_indicator: default_patch_indicator(),
            exclude_v: false,
        }
    }
}

fn default_script() -> String {
    "build.sh".to_string()
}

fn default_targets() -> Vec<String> {
    vec!["linux/amd64".to_string()]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_timeout_secs() -> u64 {
    600
}

/// Build-and-package step settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuildConfig {
    #[serde(default = "default_script")]
    pub script: String,

    /// `os/arch` pairs, built in order
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Binary name; the repository directory name when unset
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            script: default_script(),
            targets: default_targets(),
            output_dir: default_output_dir(),
            name: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BuildConfig {
    /// Parse the configured targets, failing on the first malformed one
    pub fn parsed_targets(&self) -> Result<Vec<Target>> {
        self.targets.iter().map(|t| t.parse()).collect()
    }
}

fn default_cache_file() -> String {
    ".relgate.cache.json".to_string()
}

fn default_cache_dir_env() -> String {
    "RELGATE_CACHE_DIR".to_string()
}

/// Pipeline store location.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_file")]
    pub file: String,

    /// Environment variable naming a directory that overrides the store location
    #[serde(default = "default_cache_dir_env")]
    pub dir_env: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            file: default_cache_file(),
            dir_env: default_cache_dir_env(),
        }
    }
}

fn default_provider() -> String {
    "github".to_string()
}

fn default_lookback() -> usize {
    100
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

/// Remote release provider settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    /// How many recent releases the idempotence check inspects
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            provider: default_provider(),
            lookback: default_lookback(),
            api_base: default_api_base(),
        }
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `relgate.toml` in current directory
/// 3. `relgate.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match path {
        Some(path) => parse_config_file(&path),
        None => Ok(Config::default()),
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| {
        RelgateError::config(format!("Cannot read '{}': {}", path.display(), e))
    })?;

    toml::from_str(&content)
        .map_err(|e| RelgateError::config(format!("Invalid '{}': {}", path.display(), e)))
}
