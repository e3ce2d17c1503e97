//! Zigbee link stats decoder
//!
//! One record may carry any mix of four reports, each keyed by its own
//! trigger field:
//!
//! | trigger         | report                                         |
//! |-----------------|------------------------------------------------|
//! | `sourceAddress` | live frame: counters, loss estimate, link info |
//! | `ago`           | aging: last-seen time, link type               |
//! | `parent`        | parent address (ignored when `ago` is present) |
//! | `resets`        | device reset counter                           |

use log::debug;

use crate::clock::{format_timestamp, Clock};
use crate::cluster::ClusterLabel;
use crate::entity::Entity;
use crate::record::{Payload, RawRecord};
use crate::sequence::{self, SequenceSample};

/// Attributes the Zigbee decoder may write
pub const RADIO_LINK_CHILDS: &[&str] = &[
    "ieee",
    "nwk",
    "msg_received",
    "msg_missed",
    "linkquality",
    "rssi",
    "last_msg",
    "type",
    "parent",
    "new_resets",
];

/// Decoder for per-device Zigbee link statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioLinkStats {
    attr: String,
    placeholder_parent: String,
}

impl RadioLinkStats {
    /// Create a decoder for attribute `attr`
    pub fn new(attr: impl Into<String>, placeholder_parent: impl Into<String>) -> Self {
        Self {
            attr: attr.into(),
            placeholder_parent: placeholder_parent.into(),
        }
    }

    /// Configured attribute key
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Whether the record carries anything this decoder reads
    pub fn accepts(&self, record: &RawRecord) -> bool {
        ["sourceAddress", "ago", "parent", "resets"]
            .iter()
            .any(|field| record.contains(field))
    }

    /// Decode one Zigbee record for `entity` into `payload`
    pub fn decode(
        &self,
        entity: &mut Entity,
        payload: &mut Payload,
        record: &RawRecord,
        clock: &dyn Clock,
    ) {
        if record.contains("sourceAddress") {
            self.decode_frame(entity, payload, record, clock);
        }

        if record.contains("ago") {
            self.decode_aging(payload, record, clock);
        } else if let Some(parent) = record.get("parent") {
            payload.insert("parent", parent.clone());
        }

        if record.contains("resets") {
            match record.get_i64("resets") {
                Ok(resets) => payload.insert("new_resets", entity.extra.new_resets(resets)),
                Err(e) => debug!("{}: reset counter skipped: {}", entity.id, e),
            }
        }
    }

    fn decode_frame(
        &self,
        entity: &mut Entity,
        payload: &mut Payload,
        record: &RawRecord,
        clock: &dyn Clock,
    ) {
        let extra = &mut entity.extra;
        let received = extra.record_received();
        let mut missed = *extra.msg_missed.get_or_insert(0);

        // A bad frame only costs the loss estimate for this message
        match SequenceSample::from_record(record) {
            Ok(sample) => {
                sequence::observe(extra, sample);
                missed = extra.msg_missed.unwrap_or(missed);
            }
            Err(e) => debug!("{}: loss estimate skipped: {}", entity.id, e),
        }

        payload.insert(self.attr.as_str(), format_timestamp(clock.now()));
        payload.insert("ieee", record.get_or_null("eui64"));
        payload.insert("nwk", record.get_or_null("sourceAddress"));
        payload.insert("msg_received", received);
        payload.insert("msg_missed", missed);
        payload.insert("linkquality", record.get_or_null("linkQuality"));
        payload.insert("rssi", record.get_or_null("rssi"));

        match record.parse_int("clusterId") {
            Ok(cid) => payload.insert("last_msg", ClusterLabel::resolve(cid)),
            Err(e) => debug!("{}: last_msg skipped: {}", entity.id, e),
        }
    }

    fn decode_aging(&self, payload: &mut Payload, record: &RawRecord, clock: &dyn Clock) {
        let last_seen = record
            .get_f64("ago")
            .ok()
            .and_then(|secs| clock.ago(secs));

        match last_seen {
            Some(t) => payload.insert(self.attr.as_str(), format_timestamp(t)),
            None => debug!("aging report with unusable ago: {:?}", record.get("ago")),
        }
        payload.insert("type", record.get_or_null("type"));
        payload.insert("parent", self.placeholder_parent.as_str());
    }
}
