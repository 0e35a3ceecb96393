//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Provider Credentials ===
    /// Gemini API key.
    #[serde(default)]
    pub google_api_key: Option<String>,

    /// Gemini model identifier.
    #[serde(default = "default_model")]
    pub gemini_model: String,

    /// Gemini REST base URL.
    #[serde(default = "default_base_url")]
    pub gemini_base_url: String,

    // === Upstream Behavior ===
    /// Timeout for each upstream call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Attempts for non-streamed upstream calls (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub upstream_max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub upstream_retry_delay_ms: u64,

    /// Sampling temperature for itinerary generation.
    #[serde(default = "default_temperature")]
    pub generation_temperature: f32,

    /// Output token cap passed to the provider.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    // === Request Limits ===
    /// Longest trip, in days, the gateway accepts.
    #[serde(default = "default_max_trip_days")]
    pub max_trip_days: u32,

    // === Server Configuration ===
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub api_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Log output format: pretty or json.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_model() -> String {
    "gemini-2.5-flash-preview-05-20".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_temperature() -> f32 {
    0.4
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_max_trip_days() -> u32 {
    14
}

fn default_port() -> u16 {
    5500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            google_api_key: None,
            gemini_model: default_model(),
            gemini_base_url: default_base_url(),
            upstream_timeout_secs: default_timeout_secs(),
            upstream_max_attempts: default_max_attempts(),
            upstream_retry_delay_ms: default_retry_delay_ms(),
            generation_temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_trip_days: default_max_trip_days(),
            api_port: default_port(),
            rust_log: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key().is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.gemini_model.trim().is_empty() {
            return Err(ConfigError::Invalid("GEMINI_MODEL must not be empty".to_string()));
        }

        if url::Url::parse(&self.gemini_base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "GEMINI_BASE_URL is not a valid URL: {}",
                self.gemini_base_url
            )));
        }

        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "UPSTREAM_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }

        if self.upstream_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "UPSTREAM_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.max_trip_days == 0 {
            return Err(ConfigError::Invalid("MAX_TRIP_DAYS must be at least 1".to_string()));
        }

        if !(0.0..=2.0).contains(&self.generation_temperature) {
            return Err(ConfigError::Invalid(
                "GENERATION_TEMPERATURE must be between 0.0 and 2.0".to_string(),
            ));
        }

        Ok(())
    }

    /// The API key, if present and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.google_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Upstream timeout as a Duration.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    /// Delay between upstream attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.upstream_retry_delay_ms)
    }

    /// Whether JSON log output was requested.
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
