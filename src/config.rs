//! Configuration for siteaudit.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SITEAUDIT_HOME, SITEAUDIT_CRAWL_DIR,
//!    SITEAUDIT_KEYWORDS_URL, SITEAUDIT_AI_URL, SITEAUDIT_KEYWORDS_API_KEY,
//!    SITEAUDIT_AI_API_KEY)
//! 2. Config file (.siteaudit/config.yaml)
//! 3. Defaults (~/.siteaudit)
//!
//! Config file discovery:
//! - Searches current directory and parents for .siteaudit/config.yaml
//! - Paths in the config file are relative to the .siteaudit/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::PipelineSettings;
use crate::resilience::{BreakerSettings, CacheSettings, RetryPolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".siteaudit";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .siteaudit/)
    pub home: Option<String>,
    /// Directory with crawler snapshots (relative to .siteaudit/)
    pub crawl_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub keywords_url: Option<String>,
    pub ai_url: Option<String>,
    /// Transport timeout for a single HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            keywords_url: None,
            ai_url: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Crawler snapshot directory
    pub crawl_dir: PathBuf,
    pub keywords_url: String,
    pub ai_url: String,
    #[serde(skip)]
    pub keywords_api_key: Option<String>,
    #[serde(skip)]
    pub ai_api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub breaker: BreakerSettings,
    pub cache: CacheSettings,
    pub pipeline: PipelineSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Directory holding one subdirectory per audit
    pub fn audits_dir(&self) -> PathBuf {
        self.home.join("audits")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge file settings, environment and defaults
fn resolve_config(
    config_file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
    default_home: PathBuf,
) -> ResolvedConfig {
    let (config_path, file) = match config_file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };
    let config_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = env("SITEAUDIT_HOME")
        .map(PathBuf::from)
        .or_else(|| file.paths.home.as_deref().map(|p| resolve_path(config_dir, p)))
        .unwrap_or(default_home);

    let crawl_dir = env("SITEAUDIT_CRAWL_DIR")
        .map(PathBuf::from)
        .or_else(|| {
            file.paths
                .crawl_dir
                .as_deref()
                .map(|p| resolve_path(config_dir, p))
        })
        .unwrap_or_else(|| home.join("crawls"));

    let keywords_url = env("SITEAUDIT_KEYWORDS_URL")
        .or(file.services.keywords_url)
        .unwrap_or_else(|| "http://localhost:8081".to_string());

    let ai_url = env("SITEAUDIT_AI_URL")
        .or(file.services.ai_url)
        .unwrap_or_else(|| "http://localhost:8082".to_string());

    ResolvedConfig {
        home,
        crawl_dir,
        keywords_url,
        ai_url,
        keywords_api_key: env("SITEAUDIT_KEYWORDS_API_KEY"),
        ai_api_key: env("SITEAUDIT_AI_API_KEY"),
        request_timeout_secs: file.services.request_timeout_secs,
        retry: file.retry,
        breaker: file.breaker,
        cache: file.cache,
        pipeline: file.pipeline,
        config_file: config_path,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    Ok(resolve_config(
        config_file,
        |key| std::env::var(key).ok(),
        default_home,
    ))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
