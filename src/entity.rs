//! Entities and their extra-state
//!
//! An [`Entity`] is a gateway, a Zigbee device or a BLE device. Its
//! [`ExtraState`] is the only state decoders carry from one event to the
//! next. Fields start unset, are filled lazily, and are never cleared.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Unique identifier for an entity
pub type EntityId = String;

/// What kind of device an entity is; selects its stats decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// The gateway itself
    #[serde(rename = "gateway")]
    Gateway,
    /// Zigbee end device or router
    #[serde(rename = "zigbee")]
    RadioLink,
    /// BLE device heard by the gateway
    #[serde(rename = "ble")]
    ShortRange,
}

impl EntityKind {
    /// All kinds, in registry order
    pub const ALL: [EntityKind; 3] = [Self::Gateway, Self::RadioLink, Self::ShortRange];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::RadioLink => "zigbee",
            Self::ShortRange => "ble",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "zigbee" => Ok(Self::RadioLink),
            "ble" => Ok(Self::ShortRange),
            _ => Err(StatsError::UnknownKind(s.to_string())),
        }
    }
}

/// Last pair of sequence numbers seen from a radio-link device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    /// Last APS counter
    pub seq1: u8,
    /// Last ZCL transaction sequence number
    pub seq2: u8,
}

/// Per-entity counters carried across decode calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraState {
    /// Messages received since this engine first saw the entity
    pub msg_received: Option<u64>,
    /// Estimated messages lost
    pub msg_missed: Option<u64>,
    /// Sequence numbers of the last radio frame
    pub last_seq: Option<SequenceState>,
    /// Reset count reported on first observation
    pub reset_baseline: Option<i64>,
}

impl ExtraState {
    /// Count one more received message, starting at 1; returns the new total
    pub fn record_received(&mut self) -> u64 {
        let received = self.msg_received.map_or(1, |n| n.saturating_add(1));
        self.msg_received = Some(received);
        received
    }

    /// Add to the missed-message estimate; returns the new total
    pub fn record_missed(&mut self, missed: u64) -> u64 {
        let total = self.msg_missed.unwrap_or(0).saturating_add(missed);
        self.msg_missed = Some(total);
        total
    }

    /// Resets since the first report seen; the first report becomes the baseline
    pub fn new_resets(&mut self, reported: i64) -> i64 {
        let baseline = *self.reset_baseline.get_or_insert(reported);
        reported.saturating_sub(baseline)
    }
}

/// A device or group known to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier
    pub id: EntityId,
    /// Device kind
    pub kind: EntityKind,
    /// Physical address, lowercase without separators
    pub mac: String,
    /// Decoder scratch state
    #[serde(default)]
    pub extra: ExtraState,
}

impl Entity {
    /// Create an entity with empty extra-state
    pub fn new(id: impl Into<EntityId>, kind: EntityKind, mac: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            mac: normalize_mac(&mac.into()),
            extra: ExtraState::default(),
        }
    }
}

/// Lowercase a MAC and drop `:` / `-` separators
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| *c != ':' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
