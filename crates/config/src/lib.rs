//! Configuration loading, validation, and management for Agora agents.
//!
//! Loads configuration from `~/.agora/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use agora_core::AgentProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.agora/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the platform lives
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Who this agent is
    #[serde(default)]
    pub agent: AgentConfig,

    /// Caller-side retry policy for opening the stream
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Corrective polling for claims whose outcome never arrived
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:3000".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    10
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// How claims and completions reach the platform
    #[serde(default)]
    pub claim_via: ClaimChannel,
}

fn default_agent_name() -> String {
    "agora-agent".into()
}

impl AgentConfig {
    /// Build the profile announced at registration.
    pub fn profile(&self) -> AgentProfile {
        let profile = AgentProfile::new(self.name.clone())
            .with_capabilities(self.capabilities.iter().cloned());
        match &self.endpoint {
            Some(endpoint) => profile.with_endpoint(endpoint.clone()),
            None => profile,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            capabilities: vec![],
            endpoint: None,
            claim_via: ClaimChannel::default(),
        }
    }
}

/// Channel used to send claims and completion reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimChannel {
    /// Emit `task:claim` and wait for `task:assigned`
    #[default]
    Stream,
    /// Call the assign endpoint and resolve from its response
    Request,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between corrective polls; 0 disables polling
    #[serde(default)]
    pub interval_secs: u64,
}

impl ReconcileConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agora/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `AGORA_PLATFORM_URL`
    /// - `AGORA_AGENT_NAME`
    /// - `AGORA_CAPABILITIES` (comma separated)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_path(), |key| std::env::var(key).ok())
    }

    /// Load from `path`, apply overrides looked up through `env`, then validate.
    pub fn load_with_overrides(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `path` without validating; a missing file yields the defaults.
    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("AGORA_PLATFORM_URL") {
            self.platform.url = url;
        }
        if let Some(name) = env("AGORA_AGENT_NAME") {
            self.agent.name = name;
        }
        if let Some(caps) = env("AGORA_CAPABILITIES") {
            self.agent.capabilities = caps
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
    }

    /// Get the configuration directory path (`$AGORA_HOME` or `~/.agora`).
    pub fn config_dir() -> PathBuf {
        std::env::var("AGORA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs_home().join(".agora"))
    }

    /// Path of the main config file.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.platform.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "platform.url must start with http:// or https://, got '{url}'"
            )));
        }

        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.name must not be empty".into(),
            ));
        }

        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "reconnect.multiplier must be >= 1.0".into(),
            ));
        }

        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "reconnect.initial_delay_ms must not exceed reconnect.max_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            agent: AgentConfig::default(),
            reconnect: ReconnectConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for agora_core::Error {
    fn from(err: ConfigError) -> Self {
        agora_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.platform.url, "http://localhost:3000");
        assert_eq!(config.agent.claim_via, ClaimChannel::Stream);
        assert!(config.reconcile.interval().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.platform.url, config.platform.url);
        assert_eq!(parsed.reconnect.max_attempts, config.reconnect.max_attempts);
    }

    #[test]
    fn invalid_url_rejected() {
        let mut config = AppConfig::default();
        config.platform.url = "localhost:3000".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_backoff_rejected() {
        let mut config = AppConfig::default();
        config.reconnect.initial_delay_ms = 60_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().agent.name, "agora-agent");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[agent]
name = "analyst"
capabilities = ["analysis", "coding"]
claim_via = "request"

[reconcile]
interval_secs = 15
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.name, "analyst");
        assert_eq!(config.agent.claim_via, ClaimChannel::Request);
        assert_eq!(config.platform.url, "http://localhost:3000");
        assert_eq!(config.reconcile.interval(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent\nname = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AGORA_PLATFORM_URL", "https://agora.example.com"),
            ("AGORA_AGENT_NAME", "beta"),
            ("AGORA_CAPABILITIES", "x, y,,z"),
        ]);
        let config = AppConfig::load_with_overrides(Path::new("/nonexistent/config.toml"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.platform.url, "https://agora.example.com");
        assert_eq!(config.agent.name, "beta");
        assert_eq!(config.agent.capabilities, vec!["x", "y", "z"]);
    }

    #[test]
    fn env_override_repairs_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[platform]\nurl = \"localhost:3000\"\n").unwrap();

        let err = AppConfig::load_with_overrides(&path, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let config = AppConfig::load_with_overrides(&path, |k| {
            (k == "AGORA_PLATFORM_URL").then(|| "http://platform.local:3000".to_string())
        })
        .unwrap();
        assert_eq!(config.platform.url, "http://platform.local:3000");
    }

    #[test]
    fn profile_from_agent_config() {
        let agent = AgentConfig {
            name: "alpha".into(),
            capabilities: vec!["x".into(), "x".into()],
            endpoint: Some("http://alpha.local".into()),
            claim_via: ClaimChannel::Stream,
        };
        let profile = agent.profile();
        assert_eq!(profile.capabilities, vec!["x"]);
        assert_eq!(profile.endpoint.as_deref(), Some("http://alpha.local"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("http://localhost:3000"));
        assert!(toml_str.contains("claim_via"));
    }
}
