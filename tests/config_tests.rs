//! Tests for configuration layering.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use sage::config::SageConfig;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 8] = [
    "GOOGLE_API_KEY",
    "GEMINI_API_KEY",
    "SAGE_GEMINI_BASE_URL",
    "SAGE_CLAUDE_PATH",
    "SAGE_CODEX_PATH",
    "SAGE_GEMINI_CLI_PATH",
    "SAGE_MAX_TOOL_ITERATIONS",
    "SAGE_REQUEST_TIMEOUT_SECS",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn environment_values_are_loaded() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    std::env::set_var("GEMINI_API_KEY", "env-key");
    std::env::set_var("SAGE_CODEX_PATH", "/opt/codex/bin/codex");
    std::env::set_var("SAGE_MAX_TOOL_ITERATIONS", "4");
    std::env::set_var("SAGE_REQUEST_TIMEOUT_SECS", "30");

    let config = SageConfig::from_env();
    assert_eq!(config.get_api_key("gemini").as_deref(), Some("env-key"));
    assert_eq!(
        config.get_cli_path("codex"),
        Some(PathBuf::from("/opt/codex/bin/codex"))
    );
    assert_eq!(config.max_tool_iterations(), 4);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
}

#[test]
fn gemini_key_wins_over_google_key() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    std::env::set_var("GOOGLE_API_KEY", "google");
    std::env::set_var("GEMINI_API_KEY", "gemini");

    let config = SageConfig::from_env();
    assert_eq!(config.get_api_key("gemini").as_deref(), Some("gemini"));
}

#[test]
fn environment_overrides_file() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "gemini_api_key = \"file-key\"\nmax_tool_iterations = 6\n",
    )
    .unwrap();
    std::env::set_var("GEMINI_API_KEY", "env-key");

    let config = SageConfig::from_file(&path).unwrap().overlay_env();
    assert_eq!(config.get_api_key("gemini").as_deref(), Some("env-key"));
    assert_eq!(config.max_tool_iterations(), 6);
}

#[test]
fn unparsable_numbers_keep_defaults() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    std::env::set_var("SAGE_MAX_TOOL_ITERATIONS", "lots");
    let config = SageConfig::from_env();
    assert_eq!(config.max_tool_iterations(), 10);
}

#[test]
fn zero_values_from_env_are_clamped() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    std::env::set_var("SAGE_MAX_TOOL_ITERATIONS", "0");
    std::env::set_var("SAGE_REQUEST_TIMEOUT_SECS", "0");
    let config = SageConfig::from_env();
    assert_eq!(config.max_tool_iterations(), 1);
    assert_eq!(config.request_timeout(), Duration::from_secs(120));
}

#[test]
fn explicit_setters_win() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_env();

    std::env::set_var("SAGE_GEMINI_BASE_URL", "https://env.example");
    let config = SageConfig::from_env();
    config.set_base_url("gemini", "http://127.0.0.1:9".to_string());
    assert_eq!(
        config.get_base_url("gemini").as_deref(),
        Some("http://127.0.0.1:9")
    );
}
