//! Configuration management.
//!
//! flowtmpl configuration can come from:
//! - Environment variables (FLOWTMPL_*)
//! - Config file (~/.config/flowtmpl/config.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// flowtmpl configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Template repository configuration
    #[serde(default)]
    pub repository: RepositoryConfig,
}

/// Template repository configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Directory holding one entry per template
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Attempts at finding an unused identifier before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Time limit for cloning a remote source (seconds)
    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_seconds: u64,

    /// Git executable used for remote sources
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            max_attempts: default_max_attempts(),
            clone_timeout_seconds: default_clone_timeout(),
            git_binary: default_git_binary(),
        }
    }
}

impl RepositoryConfig {
    /// Configuration with defaults and the given base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

fn default_base_dir() -> PathBuf {
    Config::data_dir().join("templates")
}

fn default_max_attempts() -> u32 {
    100
}

fn default_clone_timeout() -> u64 {
    300
}

fn default_git_binary() -> String {
    "git".to_string()
}

impl Config {
    /// Load configuration from default locations.
    pub fn load() -> Self {
        let mut config = Self::default();

        let primary_path = Self::config_dir().join("config.toml");
        if let Ok(partial) = Self::load_partial_from_path(&primary_path) {
            config.apply_partial(partial);
        }

        config.apply_env_overrides();
        config
    }

    /// Parse configuration from a TOML string, filling in defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Get the data directory.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("flowtmpl"))
            .unwrap_or_else(|| PathBuf::from(".flowtmpl"))
    }

    /// Get the config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("flowtmpl"))
            .unwrap_or_else(|| PathBuf::from(".flowtmpl"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("FLOWTMPL_TEMPLATE_DIR") {
            if !dir.is_empty() {
                self.repository.base_dir = PathBuf::from(dir);
            }
        }
        if let Ok(attempts) = std::env::var("FLOWTMPL_MAX_ATTEMPTS") {
            if let Ok(parsed) = attempts.parse::<u32>() {
                self.repository.max_attempts = parsed;
            }
        }
        if let Ok(timeout) = std::env::var("FLOWTMPL_CLONE_TIMEOUT_SECONDS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                self.repository.clone_timeout_seconds = parsed;
            }
        }
        if let Ok(git) = std::env::var("FLOWTMPL_GIT_BINARY") {
            if !git.is_empty() {
                self.repository.git_binary = git;
            }
        }
    }

    fn load_partial_from_path(path: &Path) -> std::result::Result<PartialConfig, ()> {
        let content = std::fs::read_to_string(path).map_err(|_| ())?;
        toml::from_str(&content).map_err(|_| ())
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(repository) = partial.repository {
            self.repository = repository;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    repository: Option<RepositoryConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.max_attempts, 100);
        assert_eq!(config.clone_timeout_seconds, 300);
        assert_eq!(config.git_binary, "git");
        assert!(config.base_dir.ends_with("templates"));
    }

    #[test]
    fn test_from_toml_partial_table() {
        let config = Config::from_toml_str(
            r#"
[repository]
base_dir = "/srv/templates"
max_attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(config.repository.base_dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.repository.max_attempts, 5);
        assert_eq!(config.repository.clone_timeout_seconds, 300);
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.repository, RepositoryConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(Config::from_toml_str("[repository]\nmax_attempts = \"many\"").is_err());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[repository]\ngit_binary = \"/usr/bin/git\"\n").unwrap();

        let mut config = Config::default();
        config.apply_partial(Config::load_partial_from_path(&path).unwrap());
        assert_eq!(config.repository.git_binary, "/usr/bin/git");
        assert!(Config::load_partial_from_path(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_with_base_dir() {
        let config = RepositoryConfig::with_base_dir("/tmp/repo");
        assert_eq!(config.base_dir, PathBuf::from("/tmp/repo"));
        assert_eq!(config.max_attempts, 100);
    }
}
