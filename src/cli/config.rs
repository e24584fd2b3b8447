// ABOUTME: Configuration management for the taskhop application
// ABOUTME: Handles loading configuration from files and merging environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::DEFAULT_SHELL;
use crate::session::KnownHostsPolicy;

pub const DEFAULT_IDENTITY_ENV: &str = "TASKHOP_SSH_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Hopfile used when `--hopfile` is not given
    #[serde(default)]
    pub hopfile: Option<PathBuf>,

    #[serde(default = "default_shell")]
    pub shell: String,

    /// Limit for steps that do not set their own timeout
    #[serde(default, with = "humantime_serde")]
    pub default_timeout: Option<Duration>,

    /// Environment variable holding the SSH identity file path
    #[serde(default = "default_identity_env")]
    pub identity_env: String,

    #[serde(default)]
    pub known_hosts: KnownHostsPolicy,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,

    /// Forward step output to the terminal while it runs
    #[serde(default = "default_true")]
    pub echo_output: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_identity_env() -> String {
    DEFAULT_IDENTITY_ENV.to_string()
}

fn default_connect_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hopfile: None,
            shell: default_shell(),
            default_timeout: None,
            identity_env: default_identity_env(),
            known_hosts: KnownHostsPolicy::default(),
            connect_timeout: default_connect_timeout(),
            echo_output: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path or the default locations,
    /// then apply environment overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::find_config_file() {
                Some(path) => Self::from_file(&path)?,
                None => Config::default(),
            },
        };

        config.merge_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let local = [
            PathBuf::from("taskhop.yaml"),
            PathBuf::from("taskhop.yml"),
            PathBuf::from(".taskhop.yaml"),
            PathBuf::from(".taskhop.yml"),
        ];

        if let Some(path) = local.into_iter().find(|p| p.exists()) {
            return Some(path);
        }

        dirs::home_dir()
            .map(|home| home.join(".taskhop").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Merge `TASKHOP_*` overrides read through `lookup`
    pub fn merge_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("TASKHOP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("TASKHOP_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(shell) = lookup("TASKHOP_SHELL") {
            self.shell = shell;
        }
        if let Some(hopfile) = lookup("TASKHOP_HOPFILE") {
            self.hopfile = Some(PathBuf::from(hopfile));
        }
        if let Some(policy) = lookup("TASKHOP_KNOWN_HOSTS") {
            self.known_hosts = policy.parse().map_err(anyhow::Error::msg)?;
        }

        Ok(())
    }

    /// Identity file named by the configured environment variable
    pub fn identity_from_env(&self) -> Option<PathBuf> {
        std::env::var_os(&self.identity_env)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}
