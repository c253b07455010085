use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Value shipped in the sample `.env`/config; treated the same as no key at all.
pub const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

/// Environment variables consulted for the credential, in priority order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["EXPOSR_OPENAI_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Upper bound on one analysis request. Expiry surfaces as `RequestFailed("timeout")`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl ApiConfig {
    /// True when a usable credential is configured (non-blank and not the placeholder).
    pub fn has_credential(&self) -> bool {
        let key = self.key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Ask the camera for the base64 encoding alongside the stored file.
    #[serde(default = "default_encode_base64")]
    pub encode_base64: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    /// Override log directory. Default: "logs/" under the working directory.
    pub directory: Option<String>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_endpoint() -> String { "https://api.openai.com/v1/chat/completions".into() }
fn default_model() -> String { "gpt-4o".into() }
fn default_max_tokens() -> u32 { 500 }
fn default_timeout_secs() -> u64 { 30 }
fn default_prompt() -> String {
    "Analyze this meal image and provide:\n\
     1. A list of all food items visible\n\
     2. Estimated calories\n\
     3. Nutritional information (macros: protein, carbs, fats)\n\
     4. Health tips or recommendations\n\n\
     Be concise and helpful."
        .into()
}
fn default_encode_base64() -> bool { true }
fn default_logging_enabled() -> bool { false }
fn default_log_level() -> String { "info".into() }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            prompt: default_prompt(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            encode_base64: default_encode_base64(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: None,
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load `config.toml` from `path`. A missing file yields the defaults;
    /// an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Replace the API key with the first non-empty credential found in the environment.
    pub fn with_env_credential(self) -> Self {
        self.with_credential_from(|name| std::env::var(name).ok())
    }

    fn with_credential_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let found = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty());
        if let Some(key) = found {
            self.api.key = key;
        }
        self
    }
}
