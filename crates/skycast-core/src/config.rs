use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Default radar metadata endpoint (RainViewer public maps index).
pub const DEFAULT_RADAR_SOURCE_URL: &str = "https://api.rainviewer.com/public/weather-maps.json";

/// Bounds for the proximity alert radius, in kilometers.
pub const MIN_ALERT_RADIUS_KM: f64 = 5.0;
pub const MAX_ALERT_RADIUS_KM: f64 = 20.0;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Radar feed and playback settings
    #[serde(default)]
    pub radar: RadarConfig,

    /// Proximity alert defaults
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadarConfig {
    /// Radar metadata endpoint (RainViewer-compatible JSON)
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Outer timeout for a single metadata fetch, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Refresh interval while a radar view is active, in minutes
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// Animation period between frames, in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_source_url() -> String {
    DEFAULT_RADAR_SOURCE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_refresh_minutes() -> u32 {
    5
}

fn default_frame_interval_ms() -> u64 {
    500
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            request_timeout_secs: default_request_timeout_secs(),
            refresh_minutes: default_refresh_minutes(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Whether proximity alerts start enabled for a new session
    #[serde(default)]
    pub enabled_by_default: bool,

    /// Initial alert radius for a new session, in kilometers
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
}

fn default_radius_km() -> f64 {
    10.0
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled_by_default: false,
            default_radius_km: default_radius_km(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skycast");

        Self {
            config_dir,
            radar: RadarConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config_path = Self::config_path()?;
        Self::load_validated_from(&config_path)
    }

    /// [`load_validated`](Self::load_validated) for an explicit path.
    /// Validation failures surface as [`ConfigError::Invalid`].
    pub fn load_validated_from(config_path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(config_path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.radar.source_url, "radar.source_url", &mut result);

        if self.radar.request_timeout_secs == 0 {
            result.add_error(
                "radar.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.radar.request_timeout_secs > 120 {
            result.add_warning(
                "radar.request_timeout_secs",
                "Request timeout is unusually long (>120s)",
            );
        }

        if self.radar.refresh_minutes == 0 {
            result.add_warning("radar.refresh_minutes", "Radar refresh disabled (0 minutes)");
        } else if self.radar.refresh_minutes > 60 {
            result.add_warning(
                "radar.refresh_minutes",
                "Radar refresh interval is more than an hour; nowcast frames will go stale",
            );
        }

        if self.radar.frame_interval_ms == 0 {
            result.add_error(
                "radar.frame_interval_ms",
                "Frame interval must be greater than 0",
            );
        }

        let radius = self.alerts.default_radius_km;
        if !(MIN_ALERT_RADIUS_KM..=MAX_ALERT_RADIUS_KM).contains(&radius) {
            result.add_error(
                "alerts.default_radius_km",
                format!(
                    "Alert radius must be between {} and {} km, got {}",
                    MIN_ALERT_RADIUS_KM, MAX_ALERT_RADIUS_KM, radius
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if let Some(port) = url.port() {
                    if port == 0 {
                        result.add_error(field_name, "Port cannot be 0");
                    }
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycast");

        Ok(config_dir.join("config.toml"))
    }
}
