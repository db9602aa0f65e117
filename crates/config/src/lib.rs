//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use parley_core::model::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model API key; requests may still supply their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model API host, without a trailing path
    #[serde(default = "default_api_host")]
    pub api_host: String,

    #[serde(default)]
    pub api_type: ApiType,

    /// Azure `api-version` query parameter
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Sent as `OpenAI-Organization` when talking to OpenAI directly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_deployment_id: Option<String>,

    /// Model for new conversations
    #[serde(default = "default_model")]
    pub default_model: String,

    /// System prompt for new conversations
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Exchange engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Planning and tool service
    #[serde(default)]
    pub agent: AgentServiceConfig,

    /// Search-augmented completion
    #[serde(default)]
    pub google: GoogleConfig,
}

/// Which flavour of the completion API to speak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[default]
    OpenAi,
    Azure,
}

fn default_api_host() -> String {
    "https://api.openai.com".into()
}
fn default_api_version() -> String {
    "2023-03-15-preview".into()
}
fn default_model() -> String {
    parley_core::model::FALLBACK_MODEL_ID.into()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant. Follow the user's instructions carefully. Respond using markdown."
        .into()
}
fn default_temperature() -> f32 {
    1.0
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_host", &self.api_host)
            .field("api_type", &self.api_type)
            .field("api_version", &self.api_version)
            .field("organization", &self.organization)
            .field("azure_deployment_id", &self.azure_deployment_id)
            .field("default_model", &self.default_model)
            .field("default_system_prompt", &self.default_system_prompt)
            .field("default_temperature", &self.default_temperature)
            .field("engine", &self.engine)
            .field("agent", &self.agent)
            .field("google", &self.google)
            .finish()
    }
}

/// Limits and timeouts for one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tokens kept free for the completion when packing history
    #[serde(default = "default_reserved_for_completion")]
    pub reserved_for_completion: usize,

    /// Planning calls allowed per agent exchange
    #[serde(default = "default_max_planning_iterations")]
    pub max_planning_iterations: u32,

    #[serde(default = "default_planning_timeout_secs")]
    pub planning_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Whole-request deadline for planning, tool, and search calls; for
    /// streamed completions it only bounds connecting
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Longest silence tolerated between two chunks of a streamed completion
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

fn default_reserved_for_completion() -> usize {
    1000
}
fn default_max_planning_iterations() -> u32 {
    10
}
fn default_planning_timeout_secs() -> u64 {
    60
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_stream_idle_timeout_secs() -> u64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reserved_for_completion: default_reserved_for_completion(),
            max_planning_iterations: default_max_planning_iterations(),
            planning_timeout_secs: default_planning_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
        }
    }
}

/// Where the planning and tool-execution endpoints live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServiceConfig {
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,

    /// Tools enabled when a conversation does not pick any
    #[serde(default)]
    pub default_tools: Vec<String>,
}

fn default_agent_base_url() -> String {
    "http://localhost:3000".into()
}

impl Default for AgentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            default_tools: Vec::new(),
        }
    }
}

/// Credentials and endpoint for search-augmented completion.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cse_id: Option<String>,

    /// Search endpoint base; defaults to the agent service host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &redact(&self.api_key))
            .field("cse_id", &self.cse_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override file values; see
    /// [`AppConfig::apply_env_overrides`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
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

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// The API key only comes from the environment when the file has none:
    /// `PARLEY_API_KEY` first, then `OPENAI_API_KEY`. Every other variable
    /// wins over the file. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = var("PARLEY_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(host) = var("OPENAI_API_HOST") {
            self.api_host = host;
        }
        if let Some(kind) = var("OPENAI_API_TYPE") {
            match kind.to_ascii_lowercase().as_str() {
                "azure" => self.api_type = ApiType::Azure,
                "openai" => self.api_type = ApiType::OpenAi,
                other => tracing::warn!(api_type = other, "Ignoring unknown OPENAI_API_TYPE"),
            }
        }
        if let Some(version) = var("OPENAI_API_VERSION") {
            self.api_version = version;
        }
        if let Some(org) = var("OPENAI_ORGANIZATION") {
            self.organization = Some(org);
        }
        if let Some(deployment) = var("AZURE_DEPLOYMENT_ID") {
            self.azure_deployment_id = Some(deployment);
        }
        if let Some(prompt) = var("DEFAULT_SYSTEM_PROMPT") {
            self.default_system_prompt = prompt;
        }
        if let Some(key) = var("GOOGLE_API_KEY") {
            self.google.api_key = Some(key);
        }
        if let Some(cse) = var("GOOGLE_CSE_ID") {
            self.google.cse_id = Some(cse);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let model = self.default_model_spec();
        if self.engine.reserved_for_completion >= model.token_limit {
            return Err(ConfigError::ValidationError(format!(
                "engine.reserved_for_completion ({}) must be smaller than \
                 the token limit of {} ({})",
                self.engine.reserved_for_completion, model.id, model.token_limit
            )));
        }

        if self.engine.max_planning_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_planning_iterations must be > 0".into(),
            ));
        }

        if self.engine.stream_idle_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "engine.stream_idle_timeout_secs must be > 0".into(),
            ));
        }

        if self.api_type == ApiType::Azure && self.azure_deployment_id.is_none() {
            return Err(ConfigError::ValidationError(
                "azure_deployment_id is required when api_type = \"azure\"".into(),
            ));
        }

        Ok(())
    }

    /// The catalogue entry for `default_model`, or the fallback model.
    pub fn default_model_spec(&self) -> ModelSpec {
        ModelSpec::resolve(&self.default_model)
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Both Google credentials, when configured.
    pub fn google_credentials(&self) -> Option<(&str, &str)> {
        match (&self.google.api_key, &self.google.cse_id) {
            (Some(key), Some(cse)) => Some((key.as_str(), cse.as_str())),
            _ => None,
        }
    }

    /// Render the configuration as TOML with secrets left out.
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        shown.api_key = None;
        shown.google.api_key = None;
        toml::to_string_pretty(&shown).unwrap_or_default()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_host: default_api_host(),
            api_type: ApiType::default(),
            api_version: default_api_version(),
            organization: None,
            azure_deployment_id: None,
            default_model: default_model(),
            default_system_prompt: default_system_prompt(),
            default_temperature: default_temperature(),
            engine: EngineConfig::default(),
            agent: AgentServiceConfig::default(),
            google: GoogleConfig::default(),
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

impl From<ConfigError> for parley_core::Error {
    fn from(e: ConfigError) -> Self {
        parley_core::Error::Config {
            message: e.to_string(),
        }
    }
}
