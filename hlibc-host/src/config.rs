//! Host kernel configuration.
//!
//! Describes the simulated kernel: page size, how much memory it will hand
//! out, where DMA physical addresses start and the default cache policies.

use serde::Deserialize;

use hlibc_mm::{CacheDefaults, CachePolicy};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "hlibc.yaml";
/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "HLIBC_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "HLIBC";
/// Environment variable for the log filter.
pub const LOG_ENV_VAR: &str = "HLIBC_LOG";

/// Simulated kernel parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Page size in bytes; must be a power of two.
    pub page_size: usize,
    /// Total bytes the mapping syscall may have outstanding.
    pub memory_limit: usize,
    /// First physical address handed to DMA mappings.
    pub dma_base: u64,
    pub cache: CacheConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            memory_limit: 64 * 1024 * 1024,
            dma_base: 0x8000_0000,
            cache: CacheConfig::default(),
        }
    }
}

/// Cache policies applied when a mapping names none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub normal: u8,
    pub dma: u8,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let defaults = CacheDefaults::default();
        Self {
            normal: defaults.normal.raw(),
            dma: defaults.dma.raw(),
        }
    }
}

impl HostConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `hlibc.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `HLIBC_CONFIG` environment variable (if set)
    /// 4. Environment variables with `HLIBC__` prefix, `__` between keys
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: HostConfig = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document, without consulting files or environment.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: HostConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "page_size {} is not a power of two",
                self.page_size
            )));
        }
        self.cache_defaults().map(|_| ())
    }

    pub fn cache_defaults(&self) -> Result<CacheDefaults, ConfigError> {
        let policy = |name: &str, raw: u8| {
            CachePolicy::new(raw).ok_or_else(|| {
                ConfigError::Invalid(format!("cache.{name} {raw} does not fit in 7 bits"))
            })
        };
        Ok(CacheDefaults {
            normal: policy("normal", self.cache.normal)?,
            dma: policy("dma", self.cache.dma)?,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
