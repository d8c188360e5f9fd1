//! Application configuration
//!
//! Read from `config.yaml` in the application home (`~/.reqnest`, or the
//! directory named by `REQNEST_HOME`). A missing file means defaults; every
//! field is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::DEFAULT_HTTP_URL;

pub const HOME_ENV: &str = "REQNEST_HOME";
const CONFIG_FILE: &str = "config.yaml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage directory; relative paths are resolved against the home dir
    pub data_dir: PathBuf,
    pub log_file: String,
    /// One of `error`, `warn`, `info`, `debug`, `trace`
    pub log_level: String,
    /// URL of newly created requests
    pub default_url: String,
    /// No timeout when absent
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            log_file: String::from("reqnest.log"),
            log_level: String::from("info"),
            default_url: String::from(DEFAULT_HTTP_URL),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load the configuration from the application home
    pub fn load() -> Result<(PathBuf, Config)> {
        let home = home_dir();
        let config = Self::load_from(&home)?;
        Ok((home, config))
    }

    pub fn load_from(home: &Path) -> Result<Config> {
        let path = home.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(Config::default()),
            Ok(content) => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn data_dir(&self, home: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            home.join(&self.data_dir)
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Unknown level names fall back to `info`
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.trim().parse().unwrap_or(tracing::Level::INFO)
    }
}

/// `$REQNEST_HOME`, else `~/.reqnest`, else `./.reqnest`
pub fn home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reqnest")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.data_dir(dir.path()), dir.path().join("data"));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "log_level: debug\nrequest_timeout_secs: 30\ndata_dir: /var/lib/reqnest\n",
        )
        .unwrap();

        let config = Config::load_from(dir.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.data_dir(dir.path()), PathBuf::from("/var/lib/reqnest"));
        assert_eq!(config.default_url, DEFAULT_HTTP_URL);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "log_level: [unclosed").unwrap();
        assert!(Config::load_from(dir.path()).is_err());
    }
}
