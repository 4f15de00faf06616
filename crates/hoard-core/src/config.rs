//! Configuration loading and typed config structures for hoard.
//!
//! The canonical configuration lives in `hoard-config.yaml` at the project
//! root. Every field has a default, so an empty file (or no file at all)
//! yields a working setup.

use std::path::Path;

use serde::Deserialize;

use hoard_world::TickPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `hoard-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StorageConfig {
    /// Warehouse behaviour.
    #[serde(default)]
    pub storage: StorageSection,

    /// Ingredient search defaults.
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Demo engine loop settings.
    #[serde(default)]
    pub engine: EngineSection,
}

impl StorageConfig {
    /// Load and validate configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = self.storage.energy_factor;
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::Invalid {
                field: "storage.energy_factor",
                reason: "must be a finite number >= 0",
            });
        }
        if self.storage.auto_collect_interval_ticks == 0 {
            return Err(ConfigError::Invalid {
                field: "storage.auto_collect_interval_ticks",
                reason: "must be at least 1",
            });
        }
        let radius = self.resolver.default_search_radius;
        if !radius.is_finite() || radius < 0.0 {
            return Err(ConfigError::Invalid {
                field: "resolver.default_search_radius",
                reason: "must be a finite number >= 0",
            });
        }
        Ok(())
    }

    /// The warehouse tick settings this configuration describes.
    pub fn tick_policy(&self) -> TickPolicy {
        TickPolicy {
            energy_factor: f64::from(self.storage.energy_factor),
            collect_automatically: self.storage.collect_automatically,
            auto_collect_interval: self.storage.auto_collect_interval_ticks,
            empty_on_power_loss: self.storage.empty_on_power_loss,
            forbid_emptied_items: self.storage.forbid_emptied_items,
        }
    }
}

/// Warehouse behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageSection {
    /// Power drawn per unit of stored mass.
    #[serde(default = "default_energy_factor")]
    pub energy_factor: f32,

    /// Whether warehouses pull in nearby loose items on their own.
    #[serde(default = "default_true")]
    pub collect_automatically: bool,

    /// Ticks between automatic collections.
    #[serde(default = "default_auto_collect_interval_ticks")]
    pub auto_collect_interval_ticks: u64,

    /// Whether a warehouse starved of power dumps its contents.
    #[serde(default)]
    pub empty_on_power_loss: bool,

    /// Whether dumped items are forbidden for pickup.
    #[serde(default = "default_true")]
    pub forbid_emptied_items: bool,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            energy_factor: default_energy_factor(),
            collect_automatically: true,
            auto_collect_interval_ticks: default_auto_collect_interval_ticks(),
            empty_on_power_loss: false,
            forbid_emptied_items: true,
        }
    }
}

/// Ingredient search defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResolverSection {
    /// Radius used when a request does not name one.
    #[serde(default = "default_search_radius")]
    pub default_search_radius: f32,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            default_search_radius: default_search_radius(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Demo engine loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineSection {
    /// Random seed for world seeding and item scattering.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Ticks to run before shutting down.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: default_max_ticks(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_energy_factor() -> f32 {
    1.0
}

const fn default_auto_collect_interval_ticks() -> u64 {
    600
}

const fn default_search_radius() -> f32 {
    999.0
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_max_ticks() -> u64 {
    1800
}

const fn default_true() -> bool {
    true
}
