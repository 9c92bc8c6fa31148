//! Launcher settings: score file, retention and packages to load at startup.
//! Loaded from TOML at runtime by the launcher binary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::error::{LauncherError, Result};
use crate::engine::models::Ranking;
use crate::engine::scores::DEFAULT_TOP_N;

/// Top-level TOML file structure.
#[derive(Debug, Deserialize, Clone)]
pub struct LauncherConfig {
    #[serde(default = "default_scores_file")]
    pub scores_file: PathBuf,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Packages loaded before the catalog is shown.
    #[serde(default)]
    pub plugin_dirs: Vec<PathBuf>,
    /// Ranking overrides by game id, taking precedence over what a game declares.
    #[serde(default)]
    pub rankings: HashMap<String, Ranking>,
}

fn default_scores_file() -> PathBuf {
    PathBuf::from("stats.json")
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            scores_file: default_scores_file(),
            top_n: default_top_n(),
            plugin_dirs: Vec::new(),
            rankings: HashMap::new(),
        }
    }
}

impl LauncherConfig {
    /// Resolve relative paths against the directory the config was read from.
    fn rebase(mut self, base: &Path) -> Self {
        if self.scores_file.is_relative() {
            self.scores_file = base.join(&self.scores_file);
        }
        for dir in &mut self.plugin_dirs {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }
}

/// Load the config from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LauncherError::io_at(path, e))?;
    let config: LauncherConfig = toml::from_str(&content).map_err(|e| LauncherError::Config {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.rebase(base))
}

/// Try to load the config from well-known paths, returning defaults if none is found.
pub fn load_default_config() -> LauncherConfig {
    let candidates = [
        "launcher.toml",
        "../launcher.toml",
        "/etc/minigame-launcher/launcher.toml",
    ];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), plugins = config.plugin_dirs.len(), "loaded launcher config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load launcher config");
                }
            }
        }
    }
    tracing::info!("no launcher.toml found, using built-in defaults");
    LauncherConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ErrorKind;

    #[test]
    fn test_load_config_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(
            &path,
            r#"
top_n = 5
plugin_dirs = ["packs/retro", "/opt/games/arcade"]

[rankings]
memory = "lower_is_better"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.scores_file, dir.path().join("stats.json"));
        assert_eq!(config.plugin_dirs[0], dir.path().join("packs/retro"));
        assert_eq!(config.plugin_dirs[1], PathBuf::from("/opt/games/arcade"));
        assert_eq!(config.rankings.get("memory"), Some(&Ranking::LowerIsBetter));
        assert!(!config.rankings.contains_key("snake"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(&path, "").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.top_n, DEFAULT_TOP_N);
        assert!(config.plugin_dirs.is_empty());
    }

    #[test]
    fn test_malformed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launcher.toml");
        std::fs::write(&path, "top_n = \"three\"").unwrap();

        assert_eq!(load_config(&path).unwrap_err().kind(), ErrorKind::Config);
        assert_eq!(
            load_config(&dir.path().join("absent.toml")).unwrap_err().kind(),
            ErrorKind::Io
        );
    }
}
