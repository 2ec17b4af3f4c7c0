//! Configuration system (layered: code > env > config file).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SageError;

/// Default ceiling on model ↔ tool round trips per run.
pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;
/// Default transport timeout for one adapter invocation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Layered configuration for Sage.
///
/// Resolution order, highest first:
/// 1. Values set in code (`set_api_key`, `set_cli_path`, ...)
/// 2. Environment variables (after loading `.env`)
/// 3. The TOML config file (`~/.config/sage/config.toml` by default)
#[derive(Debug, Clone)]
pub struct SageConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    cli_paths: Arc<RwLock<HashMap<String, PathBuf>>>,
    request_timeout: Duration,
    max_tool_iterations: usize,
    working_dir: Option<PathBuf>,
}

impl Default for SageConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk shape of the config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    gemini_api_key: Option<String>,
    gemini_base_url: Option<String>,
    max_tool_iterations: Option<usize>,
    request_timeout_secs: Option<u64>,
    cli_paths: HashMap<String, PathBuf>,
}

impl SageConfig {
    /// Empty config with built-in defaults.
    pub fn new() -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            cli_paths: Arc::new(RwLock::new(HashMap::new())),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            working_dir: None,
        }
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "sage")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Config file (if present) overlaid with the environment.
    pub fn load() -> Result<Self, SageError> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::new(),
        };
        Ok(config.overlay_env())
    }

    /// Load from environment variables only.
    pub fn from_env() -> Self {
        Self::new().overlay_env()
    }

    /// Load a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, SageError> {
        let raw = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&raw).map_err(|e| {
            SageError::Configuration(format!("invalid config file {}: {e}", path.display()))
        })?;

        let mut config = Self::new();
        if let Some(key) = file.gemini_api_key {
            config.set_api_key("gemini", key);
        }
        if let Some(url) = file.gemini_base_url {
            config.set_base_url("gemini", url);
        }
        for (backend, path) in file.cli_paths {
            config.set_cli_path(&backend, path);
        }
        if let Some(max) = file.max_tool_iterations {
            config = config.with_max_tool_iterations(max);
        }
        if let Some(secs) = file.request_timeout_secs {
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Overlay environment variables (and `.env`) on top of this config.
    pub fn overlay_env(mut self) -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        for env_var in ["GOOGLE_API_KEY", "GEMINI_API_KEY"] {
            if let Ok(key) = std::env::var(env_var) {
                self.set_api_key("gemini", key);
            }
        }
        if let Ok(url) = std::env::var("SAGE_GEMINI_BASE_URL") {
            self.set_base_url("gemini", url);
        }

        let path_mappings = [
            ("SAGE_CLAUDE_PATH", "claude"),
            ("SAGE_CODEX_PATH", "codex"),
            ("SAGE_GEMINI_CLI_PATH", "gemini-cli"),
        ];
        for (env_var, backend) in &path_mappings {
            if let Ok(path) = std::env::var(env_var) {
                self.set_cli_path(backend, PathBuf::from(path));
            }
        }

        if let Some(max) = env_parse::<usize>("SAGE_MAX_TOOL_ITERATIONS") {
            self = self.with_max_tool_iterations(max);
        }
        if let Some(secs) = env_parse::<u64>("SAGE_REQUEST_TIMEOUT_SECS") {
            self = self.with_request_timeout(Duration::from_secs(secs));
        }
        self
    }

    /// A zero timeout is ignored.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        if timeout.is_zero() {
            tracing::warn!("ignoring zero request timeout");
        } else {
            self.request_timeout = timeout;
        }
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max.max(1);
        self
    }

    /// Directory CLI backends are started in.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn max_tool_iterations(&self) -> usize {
        self.max_tool_iterations
    }

    pub fn set_api_key(&self, provider: &str, key: String) {
        if let Ok(mut keys) = self.api_keys.write() {
            keys.insert(provider.to_string(), key);
        }
    }

    pub fn get_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys.read().ok()?.get(provider).cloned()
    }

    pub fn set_base_url(&self, provider: &str, url: String) {
        if let Ok(mut urls) = self.base_urls.write() {
            urls.insert(provider.to_string(), url);
        }
    }

    pub fn get_base_url(&self, provider: &str) -> Option<String> {
        self.base_urls.read().ok()?.get(provider).cloned()
    }

    /// Pin a CLI backend to an explicit executable, bypassing the search.
    pub fn set_cli_path(&self, backend: &str, path: PathBuf) {
        if let Ok(mut paths) = self.cli_paths.write() {
            paths.insert(backend.to_string(), path);
        }
    }

    pub fn get_cli_path(&self, backend: &str) -> Option<PathBuf> {
        self.cli_paths.read().ok()?.get(backend).cloned()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}
