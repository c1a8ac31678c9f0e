//! Application configuration loading.
//!
//! The config is a small YAML file:
//!
//! ```yaml
//! content: /usr/share/wizshell/content
//! callback: /tmp/wizshell.sock
//! read_timeout: 30
//! ```
//!
//! Lookup order when no path is given, first existing wins:
//!
//! 1. `./wizshell.conf`
//! 2. `~/.wizshellrc`
//! 3. `/etc/wizshell.conf`
//!
//! `WIZSHELL_CONTENT`, `WIZSHELL_CALLBACK` and `WIZSHELL_READ_TIMEOUT`
//! override the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{APP_NAME, DEFAULT_READ_TIMEOUT};
use crate::error::ConfigError;

/// Configuration of the shell.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Content root holding the module tree.
    pub content: PathBuf,
    /// Default callback socket for modules that declare none.
    pub callback: PathBuf,
    /// Seconds a callback connection may take to deliver its call.
    pub read_timeout: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            content: PathBuf::new(),
            callback: PathBuf::from(format!("/tmp/{APP_NAME}.sock")),
            read_timeout: DEFAULT_READ_TIMEOUT.as_secs(),
        }
    }
}

impl AppConfig {
    /// Config file locations, in lookup order.
    pub fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!("{APP_NAME}.conf"))];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(format!(".{APP_NAME}rc")));
        }
        paths.push(PathBuf::from(format!("/etc/{APP_NAME}.conf")));
        paths
    }

    /// Loads the config from `path`, or from the first existing candidate,
    /// then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if an explicit path does not exist, the file cannot be read or
    /// parsed, or no content root is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::Missing(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Self::candidates().into_iter().find(|p| p.is_file()),
        };

        let mut config = match &file {
            Some(p) => {
                log::debug!("[Config] Loading {}", p.display());
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads one config file. A relative `content` is resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        if config.content.is_relative() && !config.content.as_os_str().is_empty() {
            if let Some(dir) = path.parent() {
                config.content = dir.join(&config.content);
            }
        }
        Ok(config)
    }

    /// Applies `WIZSHELL_*` overrides read through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(content) = var("WIZSHELL_CONTENT") {
            self.content = PathBuf::from(content);
        }

        if let Some(callback) = var("WIZSHELL_CALLBACK") {
            self.callback = PathBuf::from(callback);
        }

        if let Some(timeout) = var("WIZSHELL_READ_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.read_timeout = secs,
                Err(_) => log::warn!("[Config] Ignoring WIZSHELL_READ_TIMEOUT={timeout}"),
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.content.as_os_str().is_empty() {
            return Err(ConfigError::declaration(
                "content root is not configured (set `content` or WIZSHELL_CONTENT)",
            ));
        }
        if self.read_timeout == 0 {
            return Err(ConfigError::declaration("read_timeout must be positive"));
        }
        Ok(())
    }

    /// Per-connection read deadline.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.callback.ends_with("wizshell.sock"));
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_file_resolves_relative_content() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wizshell.conf");
        fs::write(&path, "content: modules\nread_timeout: 5\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.content, tmp.path().join("modules"));
        assert_eq!(config.read_timeout, 5);
        assert_eq!(config.callback, AppConfig::default().callback);
    }

    #[test]
    fn test_parse_error_names_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.conf");
        fs::write(&path, "read_timeout: [not, a, number]\n").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.conf"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("WIZSHELL_CONTENT", "/srv/content"),
            ("WIZSHELL_CALLBACK", "/run/w.sock"),
            ("WIZSHELL_READ_TIMEOUT", "oops"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.content, PathBuf::from("/srv/content"));
        assert_eq!(config.callback, PathBuf::from("/run/w.sock"));
        assert_eq!(config.read_timeout, 30);
    }

    #[test]
    fn test_explicit_missing_path() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/wizshell.conf"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_validate_requires_content() {
        assert!(AppConfig::default().validate().is_err());
        let config = AppConfig {
            content: PathBuf::from("/c"),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
