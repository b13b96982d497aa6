use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_ROOT: &str = "http://localhost:8082/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read frontend config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse backend root URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings for the binding runtime and its backend client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Path root every backend endpoint is joined onto.
    pub root: Url,
    pub message_timeout_ms: u64,
    pub dialog_timeout_ms: u64,
    pub template_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            root: Url::parse(DEFAULT_ROOT).expect("default root is a valid URL"),
            message_timeout_ms: 5_000,
            dialog_timeout_ms: 5_000,
            template_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl FrontendConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            _ => Self::default(),
        };
        Ok(config.normalized())
    }

    /// Reads `FRONTEND_CONFIG` (YAML path) and lets `FRONTEND_ROOT` override the root.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("FRONTEND_CONFIG").ok().map(PathBuf::from);
        let mut config = Self::load(path)?;
        if let Ok(root) = std::env::var("FRONTEND_ROOT") {
            config.root = Url::parse(&root)?;
        }
        Ok(config.normalized())
    }

    pub fn with_root(mut self, root: Url) -> Self {
        self.root = root;
        self.normalized()
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn dialog_timeout(&self) -> Duration {
        Duration::from_millis(self.dialog_timeout_ms)
    }

    pub fn template_timeout(&self) -> Duration {
        Duration::from_millis(self.template_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    // Url::join drops the last path segment unless the base ends with a slash.
    fn normalized(mut self) -> Self {
        if !self.root.path().ends_with('/') {
            let path = format!("{}/", self.root.path());
            self.root.set_path(&path);
        }
        self
    }
}
