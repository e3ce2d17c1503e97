//! BLE stats decoder

use crate::clock::{format_timestamp, Clock};
use crate::entity::Entity;
use crate::record::Payload;

/// Attributes the BLE decoder may write
pub const SHORT_RANGE_CHILDS: &[&str] = &["mac", "msg_received"];

/// Decoder counting BLE advertisements per device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortRangeStats {
    attr: String,
}

impl ShortRangeStats {
    /// Create a decoder for attribute `attr`
    pub fn new(attr: impl Into<String>) -> Self {
        Self { attr: attr.into() }
    }

    /// Configured attribute key
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Count one advertisement; fires on every record
    pub fn decode(&self, entity: &mut Entity, payload: &mut Payload, clock: &dyn Clock) {
        let received = entity.extra.record_received();

        payload.insert(self.attr.as_str(), format_timestamp(clock.now()));
        payload.insert("mac", entity.mac.as_str());
        payload.insert("msg_received", received);
    }
}
