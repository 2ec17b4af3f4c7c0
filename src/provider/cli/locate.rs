//! Executable discovery for CLI backends.

use std::path::{Path, PathBuf};

use crate::config::SageConfig;
use crate::models::CliKind;

/// Resolve the executable for `kind`.
///
/// Order: explicit config path, then known install locations for the
/// platform, then the bare executable name (resolved through `PATH` at
/// spawn time).
pub fn resolve(kind: CliKind, config: &SageConfig) -> PathBuf {
    if let Some(path) = config.get_cli_path(kind.as_str()) {
        return path;
    }
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    candidates(kind, home.as_deref())
        .into_iter()
        .find(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from(kind.executable()))
}

/// Known install locations, most specific first.
pub fn candidates(kind: CliKind, home: Option<&Path>) -> Vec<PathBuf> {
    let exe = kind.executable();
    let mut paths = Vec::new();

    if cfg!(windows) {
        if let Some(home) = home {
            paths.push(home.join("AppData/Roaming/npm").join(format!("{exe}.cmd")));
            paths.push(home.join(".bun/bin").join(format!("{exe}.exe")));
        }
        return paths;
    }

    if let Some(home) = home {
        if kind == CliKind::ClaudeCode {
            paths.push(home.join(".claude/local").join(exe));
        }
        for dir in [".local/bin", ".npm-global/bin", ".bun/bin", ".volta/bin"] {
            paths.push(home.join(dir).join(exe));
        }
    }
    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from("/opt/homebrew/bin").join(exe));
    }
    for dir in ["/usr/local/bin", "/usr/bin"] {
        paths.push(PathBuf::from(dir).join(exe));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_override_wins() {
        let config = SageConfig::new();
        config.set_cli_path("codex", PathBuf::from("/custom/codex"));
        assert_eq!(resolve(CliKind::Codex, &config), PathBuf::from("/custom/codex"));
    }

    #[cfg(unix)]
    #[test]
    fn home_locations_come_first() {
        let home = Path::new("/home/u");
        let paths = candidates(CliKind::ClaudeCode, Some(home));
        assert_eq!(paths[0], PathBuf::from("/home/u/.claude/local/claude"));
        assert_eq!(paths.last().unwrap(), &PathBuf::from("/usr/bin/claude"));

        let gemini = candidates(CliKind::GeminiCli, Some(home));
        assert_eq!(gemini[0], PathBuf::from("/home/u/.local/bin/gemini"));
    }
}
