//! Configuration management for the CEP weather services
//!
//! Loads an optional TOML file, then `CEP_WEATHER__*` environment overrides,
//! then the legacy `WEATHER_API_KEY` variable. Everything is validated once at
//! startup and treated as read-only afterwards.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CEP_WEATHER_CONFIG";

/// Legacy variable holding the weather API key
pub const LEGACY_API_KEY_ENV: &str = "WEATHER_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid(message.into())
    }
}

/// Root configuration shared by both binaries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub geocoding: GeocodingConfig,
    pub weather: WeatherConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind; each binary falls back to its own default when unset
    pub port: Option<u16>,
    /// Deadline for handling one inbound request
    pub request_timeout_seconds: u32,
}

/// Geocoding collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    pub timeout_seconds: u32,
    /// Nominatim rejects requests without an identifying user agent
    pub user_agent: String,
}

/// Weather collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_seconds: u32,
    pub user_agent: String,
}

/// Where the gateway forwards requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub resolver_url: String,
    pub timeout_seconds: u32,
    /// Sent on the hop to the resolver service
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub service_name: Option<String>,
    /// OTLP/HTTP traces endpoint
    pub otlp_endpoint: String,
}

fn default_timeout() -> u32 {
    30
}

fn default_user_agent() -> String {
    concat!("cep-weather/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            request_timeout_seconds: default_timeout(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.weatherapi.com/v1".to_string(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            resolver_url: "http://localhost:8080".to_string(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
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

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: None,
            otlp_endpoint: "http://localhost:4318/v1/traces".to_string(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.into())
    }
}

impl ServiceConfig {
    /// Load configuration from the file named by `CEP_WEATHER_CONFIG`
    /// (default `config.toml`) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        Self::load_from_path(path)
    }

    /// Load configuration from the given file and the environment
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("CEP_WEATHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("weather.api_key", env::var(LEGACY_API_KEY_ENV).ok())?
            .build()?;

        let config: ServiceConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings shared by both services
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_urls()?;
        self.validate_timeouts()?;
        self.validate_logging()?;
        Ok(())
    }

    /// The resolver cannot start without a weather API key
    pub fn validate_resolver(&self) -> Result<(), ConfigError> {
        match self.weather.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::invalid(format!(
                "weather.api_key is required (set {LEGACY_API_KEY_ENV} or CEP_WEATHER__WEATHER__API_KEY)"
            ))),
        }
    }

    fn validate_urls(&self) -> Result<(), ConfigError> {
        let urls = [
            ("geocoding.base_url", &self.geocoding.base_url),
            ("weather.base_url", &self.weather.base_url),
            ("gateway.resolver_url", &self.gateway.resolver_url),
            ("telemetry.otlp_endpoint", &self.telemetry.otlp_endpoint),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::invalid(format!(
                    "{name} must be an HTTP or HTTPS URL, got '{url}'"
                )));
            }
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("server.request_timeout_seconds", self.server.request_timeout_seconds),
            ("geocoding.timeout_seconds", self.geocoding.timeout_seconds),
            ("weather.timeout_seconds", self.weather.timeout_seconds),
            ("gateway.timeout_seconds", self.gateway.timeout_seconds),
        ];
        for (name, seconds) in timeouts {
            if !(1..=300).contains(&seconds) {
                return Err(ConfigError::invalid(format!(
                    "{name} must be between 1 and 300 seconds"
                )));
            }
        }
        Ok(())
    }

    fn validate_logging(&self) -> Result<(), ConfigError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            )));
        }
        Ok(())
    }
}
