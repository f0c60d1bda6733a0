//! Agent configuration
//!
//! Settings come from a YAML file, then `PORTAINER_*` environment
//! variables, then command-line flags (applied by the binary).

use crate::error::{Result, StackError};
use crate::portainer::RetryPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default configuration file name under the user config directory
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

pub const ENV_URL: &str = "PORTAINER_URL";
pub const ENV_USERNAME: &str = "PORTAINER_USERNAME";
pub const ENV_PASSWORD: &str = "PORTAINER_PASSWORD";
pub const ENV_ENDPOINT_ID: &str = "PORTAINER_ENDPOINT_ID";

/// Connection settings for one Portainer instance
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortainerConfig {
    /// Portainer URL
    pub url: String,
    /// Username for authentication
    pub username: String,
    /// Password for authentication
    pub password: String,
    /// Endpoint to deploy to; unset (or negative) means the first one
    #[serde(deserialize_with = "legacy_endpoint_id")]
    pub endpoint_id: Option<i64>,
    /// Skip TLS verification
    pub insecure: bool,
    /// Retry settings for every request
    pub retry: RetryPolicy,
}

impl Default for PortainerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000".to_string(),
            username: "admin".to_string(),
            password: String::new(),
            endpoint_id: None,
            insecure: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for PortainerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortainerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("endpoint_id", &self.endpoint_id)
            .field("insecure", &self.insecure)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Full agent configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Portainer connection
    pub portainer: PortainerConfig,
    /// Name of the stack to deploy
    pub stack_name: Option<String>,
    /// Compose file holding the stack configuration
    pub stack_file: Option<PathBuf>,
}

impl AgentConfig {
    /// `<config dir>/stackctl/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stackctl").join(DEFAULT_CONFIG_FILE))
    }

    /// Parse configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StackError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn parse_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| StackError::Yaml(format!("Failed to parse configuration: {}", e)))
    }

    /// Load an explicit file, or the default file when it exists
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply `PORTAINER_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.portainer.url = url;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.portainer.username = username;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.portainer.password = password;
        }
        if let Some(raw) = lookup(ENV_ENDPOINT_ID) {
            let id: i64 = raw.trim().parse().map_err(|_| {
                StackError::InvalidConfig(format!("{} must be an integer, got {:?}", ENV_ENDPOINT_ID, raw))
            })?;
            self.portainer.endpoint_id = endpoint_from_raw(id);
        }
        Ok(())
    }

    /// Check that a deployment can be attempted
    pub fn validate(&self) -> Result<()> {
        if self.portainer.url.trim().is_empty() {
            return Err(StackError::InvalidConfig("Portainer URL is empty".to_string()));
        }
        if self.portainer.username.is_empty() {
            return Err(StackError::InvalidConfig("Portainer username is empty".to_string()));
        }
        if self.portainer.retry.max_attempts == 0 {
            return Err(StackError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Map a raw endpoint id to an optional one; negative ids mean "unspecified"
pub fn endpoint_from_raw(raw: i64) -> Option<i64> {
    (raw >= 0).then_some(raw)
}

fn legacy_endpoint_id<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(endpoint_from_raw))
}
