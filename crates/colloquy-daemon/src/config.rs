//! Daemon configuration.
//!
//! Configuration is loaded from `~/.config/colloquy/config.toml`. Every
//! field has a default, so a missing file yields a working configuration
//! that talks to OpenAI with the key from `OPENAI_API_KEY`.
//!
//! ## Example Configuration
//!
//! ```toml
//! [provider]
//! name = "openai"
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [engine]
//! reply_timeout_seconds = 30
//! title_timeout_seconds = 10
//! max_tool_call_iterations = 15
//!
//! [tools]
//! calculator = true
//! weather = true
//! current_date = true
//! ```

use std::fs;
use std::path::PathBuf;

use colloquy_common::client::Config as ClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Daemon configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reply and title engine settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Built-in tool toggles.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (informational).
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Default model for all requests.
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional custom base URL for OpenAI-compatible endpoints.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_seconds: None,
        }
    }
}

/// Reply and title engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model override for reply generation.
    #[serde(default)]
    pub reply_model: Option<String>,

    /// Model override for title generation.
    #[serde(default)]
    pub title_model: Option<String>,

    /// System prompt override for reply generation.
    #[serde(default)]
    pub reply_system_prompt: Option<String>,

    /// Prompt override for title generation.
    #[serde(default)]
    pub title_prompt: Option<String>,

    /// Deadline for reply generation, in seconds.
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_seconds: u64,

    /// Deadline for title generation, in seconds.
    #[serde(default = "default_title_timeout")]
    pub title_timeout_seconds: u64,

    /// Maximum tool call iterations per reply.
    #[serde(default = "default_max_iterations")]
    pub max_tool_call_iterations: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reply_model: None,
            title_model: None,
            reply_system_prompt: None,
            title_prompt: None,
            reply_timeout_seconds: default_reply_timeout(),
            title_timeout_seconds: default_title_timeout(),
            max_tool_call_iterations: default_max_iterations(),
        }
    }
}

/// Built-in tool toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Enable the calculator tool.
    #[serde(default = "default_true")]
    pub calculator: bool,

    /// Enable the weather lookup tool.
    #[serde(default = "default_true")]
    pub weather: bool,

    /// Enable the current date tool.
    #[serde(default = "default_true")]
    pub current_date: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            calculator: true,
            weather: true,
            current_date: true,
        }
    }
}

fn default_provider_name() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

const fn default_reply_timeout() -> u64 {
    30
}

const fn default_title_timeout() -> u64 {
    10
}

const fn default_max_iterations() -> u32 {
    15
}

const fn default_true() -> bool {
    true
}

impl DaemonConfig {
    /// Loads configuration from the default location.
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined, the
    /// file cannot be read, or it fails to parse or validate.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| DaemonError::Config(format!("failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| {
                DaemonError::Config("failed to determine config directory".to_string())
            })?
            .join("colloquy");

        Ok(config_dir.join("config.toml"))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is empty or a timeout or the
    /// iteration cap is zero.
    pub fn validate(&self) -> Result<()> {
        if self.provider.model.trim().is_empty() {
            return Err(DaemonError::Config("provider.model must not be empty".to_string()));
        }
        if self.engine.reply_timeout_seconds == 0 {
            return Err(DaemonError::Config(
                "engine.reply_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.engine.title_timeout_seconds == 0 {
            return Err(DaemonError::Config(
                "engine.title_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.engine.max_tool_call_iterations == 0 {
            return Err(DaemonError::Config(
                "engine.max_tool_call_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the LLM client configuration, reading the API key from the
    /// configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment variable is unset or empty.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = std::env::var(&self.provider.api_key_env).map_err(|_| {
            DaemonError::Config(format!(
                "API key environment variable {} is not set",
                self.provider.api_key_env
            ))
        })?;
        if api_key.is_empty() {
            return Err(DaemonError::Config(format!(
                "API key environment variable {} is empty",
                self.provider.api_key_env
            )));
        }

        let mut config =
            ClientConfig::new(self.provider.name.clone(), self.provider.model.clone())
                .with_api_key(api_key);
        if let Some(base_url) = &self.provider.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(timeout) = self.provider.timeout_seconds {
            config = config.with_timeout(timeout);
        }

        Ok(config)
    }
}
