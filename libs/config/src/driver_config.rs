//! Driver Configuration Module
//!
//! Loads [`DriverConfig`] from built-in defaults, an optional TOML file and
//! environment overrides.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use driver_types::ProductVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main driver configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DriverConfig {
    pub invoker: InvokerSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub product: ProductSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct InvokerSettings {
    pub ref_id_prefix: String,
    pub ui_queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub socket_path: PathBuf,
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `info` or `driver_invoker=debug`
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProductSettings {
    pub product_code: String,
    pub is_snapshot: bool,
    pub baseline_version: u32,
    pub build_number: String,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            ref_id_prefix: defaults::invoker::REF_ID_PREFIX.to_string(),
            ui_queue_capacity: defaults::invoker::UI_QUEUE_CAPACITY,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(defaults::server::SOCKET_PATH),
            max_concurrent_requests: defaults::server::MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::logging::LEVEL.to_string(),
            json: false,
        }
    }
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            product_code: defaults::product::PRODUCT_CODE.to_string(),
            is_snapshot: true,
            baseline_version: defaults::product::BASELINE_VERSION,
            build_number: defaults::product::BUILD_NUMBER.to_string(),
        }
    }
}

impl ProductSettings {
    pub fn version(&self) -> ProductVersion {
        ProductVersion {
            product_code: self.product_code.clone(),
            is_snapshot: self.is_snapshot,
            baseline_version: self.baseline_version,
            build_number: self.build_number.clone(),
        }
    }
}

impl DriverConfig {
    /// Load configuration with environment overrides
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let base = Config::try_from(&DriverConfig::default())
            .context("Failed to serialize default configuration")?;

        let file = match path {
            Some(path) => {
                info!("Loading driver config: {:?}", path);
                File::from(path).required(true)
            }
            None => {
                debug!("Loading optional driver config: {}", defaults::CONFIG_PATH);
                File::from(Path::new(defaults::CONFIG_PATH)).required(false)
            }
        };

        let config = Config::builder()
            .add_source(base)
            .add_source(file)
            .add_source(
                Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse a complete or partial TOML document over the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse driver configuration")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize driver configuration")
    }

    /// Expand environment variables in the socket path
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let raw = self.server.socket_path.to_string_lossy().to_string();
        let expanded = shellexpand::env(&raw).context("Failed to expand socket path")?;
        self.server.socket_path = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    /// Reject settings the host cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.invoker.ref_id_prefix.is_empty() {
            bail!("invoker.ref_id_prefix must not be empty");
        }
        if self.invoker.ui_queue_capacity == 0 {
            bail!("invoker.ui_queue_capacity must be greater than zero");
        }
        if self.server.max_concurrent_requests == 0 {
            bail!("server.max_concurrent_requests must be greater than zero");
        }
        if self.server.socket_path.as_os_str().is_empty() {
            bail!("server.socket_path must not be empty");
        }
        Ok(())
    }
}

/// Convenience function: load, expand and validate
pub fn load_config(path: Option<&Path>) -> Result<DriverConfig> {
    let mut config = DriverConfig::load(path)?;
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}
