//! Endpoint configuration loading and validation

use crate::logging::LoggingConfig;
use anyhow::{Context, Result};
use bic_pldm_protocol::{DEVICE_IDENTIFIERS_HEADER_SIZE, DeviceIdentity, PLDM_MAX_DATA_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_SCHEMA_VERSION: &str = "bic.config/1";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bic/endpoint.json";

/// Upper bound accepted for `max_payload_size`.
const MAX_PAYLOAD_CEILING: usize = 4096;

/// Complete endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Configuration schema version
    pub schema_version: String,
    /// Largest PLDM response payload in bytes
    pub max_payload_size: usize,
    /// Identity reported to `QueryDeviceIdentifiers`
    pub identity: DeviceIdentity,
    /// Component ids excluded from updates
    #[serde(default)]
    pub disabled_components: Vec<u16>,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Slot presence polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub slots: Vec<PresenceSlotConfig>,
}

/// One polled slot and the sensor its events are reported under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSlotConfig {
    pub slot: u8,
    pub sensor_id: u16,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: 1000,
            slots: Vec::new(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION.to_string(),
            max_payload_size: PLDM_MAX_DATA_SIZE,
            identity: DeviceIdentity::default(),
            disabled_components: Vec::new(),
            presence: PresenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EndpointConfig {
    /// Load configuration from [`DEFAULT_CONFIG_PATH`]
    pub async fn load() -> Result<Self> {
        Self::load_from_path(Self::default_config_path()).await
    }

    /// Load configuration from a specific path, writing the default if the
    /// file does not exist yet.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to check config file: {:?}", path))?
        {
            info!("Config file not found at {:?}, creating default", path);
            let config = Self::default();
            config.save_to_path(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: EndpointConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub async fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.schema_version.starts_with("bic.config/") {
            anyhow::bail!("Invalid schema version: {}", self.schema_version);
        }

        if self.max_payload_size < DEVICE_IDENTIFIERS_HEADER_SIZE
            || self.max_payload_size > MAX_PAYLOAD_CEILING
        {
            anyhow::bail!("Invalid max payload size: {} bytes", self.max_payload_size);
        }

        let mut seen = BTreeSet::new();
        for id in &self.disabled_components {
            if !seen.insert(*id) {
                anyhow::bail!("Component {} is listed as disabled more than once", id);
            }
        }

        if self.presence.enabled && self.presence.poll_interval_ms == 0 {
            anyhow::bail!("Invalid presence poll interval: 0 ms");
        }

        self.logging.level()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() -> Result<()> {
        let config = EndpointConfig::default();
        config.validate()?;
        assert_eq!(config.max_payload_size, PLDM_MAX_DATA_SIZE);
        assert_eq!(config.identity, DeviceIdentity::default());
        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EndpointConfig {
            schema_version: "wheel.config/1".to_string(),
            ..EndpointConfig::default()
        };
        assert!(matches!(config.validate(), Err(e) if e.to_string().contains("schema version")));

        config.schema_version = CONFIG_SCHEMA_VERSION.to_string();
        config.max_payload_size = DEVICE_IDENTIFIERS_HEADER_SIZE - 1;
        assert!(matches!(config.validate(), Err(e) if e.to_string().contains("max payload")));

        config.max_payload_size = MAX_PAYLOAD_CEILING + 1;
        assert!(matches!(config.validate(), Err(e) if e.to_string().contains("max payload")));

        config.max_payload_size = 64;
        config.disabled_components = vec![2, 4, 2];
        assert!(matches!(config.validate(), Err(e) if e.to_string().contains("more than once")));

        config.disabled_components = vec![2, 4];
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(e) if e.to_string().contains("log level")));
    }
}
