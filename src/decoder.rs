//! Stats decoders
//!
//! Three decoders turn raw gateway records into payload attributes:
//!
//! - [`GatewayStats`]: network, health and serial-port counters of the gateway
//! - [`RadioLinkStats`]: per-device Zigbee link statistics and loss estimate
//! - [`ShortRangeStats`]: per-device BLE advertisement counter
//!
//! They are wrapped in the closed [`Decoder`] enum so the dispatcher can
//! hold and route them without trait objects.

mod gateway;
mod radio_link;
mod short_range;

pub use gateway::{format_uptime, parse_serial_line, GatewayStats, GATEWAY_CHILDS};
pub use radio_link::{RadioLinkStats, RADIO_LINK_CHILDS};
pub use short_range::{ShortRangeStats, SHORT_RANGE_CHILDS};

use crate::clock::Clock;
use crate::config::StatsConfig;
use crate::entity::{Entity, EntityKind};
use crate::record::{Payload, RawRecord};

/// One of the three stats decoders
#[derive(Debug, Clone, PartialEq)]
pub enum Decoder {
    /// Gateway health and radio counters
    GatewayStats(GatewayStats),
    /// Zigbee link statistics
    RadioLinkStats(RadioLinkStats),
    /// BLE statistics
    ShortRangeStats(ShortRangeStats),
}

impl Decoder {
    /// Build the decoder serving `kind`
    pub fn for_kind(kind: EntityKind, config: &StatsConfig) -> Self {
        match kind {
            EntityKind::Gateway => Self::GatewayStats(GatewayStats::new(
                config.attrs.gateway.clone(),
                config.rssi_offset,
            )),
            EntityKind::RadioLink => Self::RadioLinkStats(RadioLinkStats::new(
                config.attrs.radio_link.clone(),
                config.placeholder_parent.clone(),
            )),
            EntityKind::ShortRange => {
                Self::ShortRangeStats(ShortRangeStats::new(config.attrs.short_range.clone()))
            }
        }
    }

    /// Entity kind this decoder serves
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::GatewayStats(_) => EntityKind::Gateway,
            Self::RadioLinkStats(_) => EntityKind::RadioLink,
            Self::ShortRangeStats(_) => EntityKind::ShortRange,
        }
    }

    /// Configured attribute key
    pub fn attr(&self) -> &str {
        match self {
            Self::GatewayStats(d) => d.attr(),
            Self::RadioLinkStats(d) => d.attr(),
            Self::ShortRangeStats(d) => d.attr(),
        }
    }

    /// Attribute names this decoder may write besides its own key
    pub fn childs(&self) -> &'static [&'static str] {
        match self {
            Self::GatewayStats(_) => GATEWAY_CHILDS,
            Self::RadioLinkStats(_) => RADIO_LINK_CHILDS,
            Self::ShortRangeStats(_) => SHORT_RANGE_CHILDS,
        }
    }

    /// Whether the record carries any field this decoder reacts to
    pub fn accepts(&self, record: &RawRecord) -> bool {
        match self {
            Self::GatewayStats(d) => d.accepts(record),
            Self::RadioLinkStats(d) => d.accepts(record),
            Self::ShortRangeStats(_) => true,
        }
    }

    /// Decode `record` for `entity`, merging attributes into `payload`
    ///
    /// Never fails: fields that cannot be read are skipped and logged.
    pub fn decode(
        &self,
        entity: &mut Entity,
        payload: &mut Payload,
        record: &RawRecord,
        clock: &dyn Clock,
    ) {
        match self {
            Self::GatewayStats(d) => d.decode(payload, record),
            Self::RadioLinkStats(d) => d.decode(entity, payload, record, clock),
            Self::ShortRangeStats(d) => d.decode(entity, payload, clock),
        }
    }
}
