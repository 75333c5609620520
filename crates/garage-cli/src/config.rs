//! Configuration loading. TOML file with environment variable overrides.
//!
//! Looks for `garage.toml` in the working directory, or the file named by
//! `GARAGE_CONFIG`. Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use garage_core::SetupCode;
use garage_core::constants::DEFAULT_SIMULATED_TRAVEL_MS;
use garage_server::AccessoryConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "garage.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Accessory identity, setup code and engine tuning.
    pub accessory: AccessoryConfig,
    /// Timing of the simulated door and lock.
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time the simulated door takes to open or close.
    pub door_travel_ms: u64,
    /// Time the simulated bolt takes to engage or release.
    pub lock_actuation_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    /// Load configuration from `garage.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("GARAGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("GARAGE_NAME") {
            self.accessory.name = val;
        }
        if let Some(val) = var("GARAGE_SETUP_CODE") {
            self.accessory.setup_code =
                SetupCode::new(&val).map_err(|err| ConfigError::Validation(err.to_string()))?;
        }
        if let Some(val) = var("GARAGE_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.accessory
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if self.simulation.door_travel_ms == 0 || self.simulation.lock_actuation_ms == 0 {
            return Err(ConfigError::Validation(
                "simulated travel times must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn door_travel(&self) -> Duration {
        Duration::from_millis(self.door_travel_ms)
    }

    pub fn lock_actuation(&self) -> Duration {
        Duration::from_millis(self.lock_actuation_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            door_travel_ms: DEFAULT_SIMULATED_TRAVEL_MS,
            lock_actuation_ms: DEFAULT_SIMULATED_TRAVEL_MS / 4,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "garage_opener=info,garage_server=info,garage_hardware=info".to_string(),
        }
    }
}
