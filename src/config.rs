//! Configuration types for gwstats

use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

/// Engine-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Attribute keys of the three decoders
    pub attrs: AttrConfig,

    /// Offset subtracted from the gateway's raw Wi-Fi signal value
    pub rssi_offset: i64,

    /// Parent address reported with aging reports
    pub placeholder_parent: String,

    /// Entity store limits
    pub store: StoreConfig,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            attrs: AttrConfig::default(),
            rssi_offset: 100,
            placeholder_parent: "0xABCD".to_string(),
            store: StoreConfig::default(),
        }
    }
}

impl StatsConfig {
    /// Parse a configuration from JSON; missing fields take defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with a bounded entity store
    pub fn with_max_entities(max_entities: usize) -> Self {
        Self {
            store: StoreConfig {
                max_entities: Some(max_entities),
            },
            ..Default::default()
        }
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let attrs = [
            &self.attrs.gateway,
            &self.attrs.radio_link,
            &self.attrs.short_range,
        ];
        if attrs.iter().any(|a| a.is_empty()) {
            return Err(StatsError::InvalidConfig(
                "attribute keys must not be empty".to_string(),
            ));
        }
        if attrs[0] == attrs[1] || attrs[0] == attrs[2] || attrs[1] == attrs[2] {
            return Err(StatsError::InvalidConfig(
                "attribute keys must be distinct".to_string(),
            ));
        }
        if self.store.max_entities == Some(0) {
            return Err(StatsError::InvalidConfig(
                "store.max_entities must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Attribute key owned by each decoder
///
/// The key doubles as the payload attribute holding the link-event
/// timestamp (`zigbee`, `ble`) and, for the gateway, the attribute copied
/// verbatim from the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrConfig {
    /// Gateway stats key
    pub gateway: String,
    /// Zigbee link stats key
    pub radio_link: String,
    /// BLE stats key
    pub short_range: String,
}

impl Default for AttrConfig {
    fn default() -> Self {
        Self {
            gateway: "gateway".to_string(),
            radio_link: "zigbee".to_string(),
            short_range: "ble".to_string(),
        }
    }
}

/// Entity store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of entities (`None` = unbounded)
    pub max_entities: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = StatsConfig::default();
        assert_eq!(config.attrs.gateway, "gateway");
        assert_eq!(config.attrs.radio_link, "zigbee");
        assert_eq!(config.attrs.short_range, "ble");
        assert_eq!(config.rssi_offset, 100);
        assert_eq!(config.placeholder_parent, "0xABCD");
        assert!(config.store.max_entities.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let config = StatsConfig::from_json_str(r#"{"rssi_offset": 90, "store": {"max_entities": 8}}"#)
            .unwrap();
        assert_eq!(config.rssi_offset, 90);
        assert_eq!(config.store.max_entities, Some(8));
        assert_eq!(config.attrs, AttrConfig::default());
    }

    #[test]
    fn test_config_rejects_duplicate_attrs() {
        let result = StatsConfig::from_json_str(r#"{"attrs": {"radio_link": "ble"}}"#);
        assert!(matches!(result, Err(StatsError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_zero_capacity() {
        let config = StatsConfig::with_max_entities(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"placeholder_parent": "0x0000"}}"#).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let config = StatsConfig::from_json_str(&text).unwrap();
        assert_eq!(config.placeholder_parent, "0x0000");
    }
}
