//! Message-loss estimation from 8-bit sequence counters
//!
//! Every Zigbee frame carries two independent sequence numbers: the APS
//! counter reported next to the frame, and the ZCL transaction sequence
//! number inside the application payload. Either one can jump on its own
//! (retransmissions, firmware resets), so the gap between consecutive
//! frames is measured on both and the smaller gap is counted as lost.

use crate::entity::{ExtraState, SequenceState};
use crate::error::FieldError;
use crate::record::RawRecord;

/// Record field holding the APS counter
pub const APS_COUNTER_FIELD: &str = "APSCounter";

/// Record field holding the APS payload as hex text (sic)
pub const APS_PAYLOAD_FIELD: &str = "APSPlayload";

/// ZCL frame-control bit: a 2-byte manufacturer code follows
const MANUFACTURER_SPECIFIC: u8 = 0x04;

/// Number of sequence slots skipped between `last` and `new`, modulo 256
pub fn modular_gap(new: u8, last: u8) -> u8 {
    new.wrapping_sub(last).wrapping_sub(1)
}

/// The two sequence numbers extracted from one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSample {
    /// APS counter
    pub seq_a: u8,
    /// ZCL transaction sequence number
    pub seq_b: u8,
}

impl SequenceSample {
    /// Extract both sequence numbers from a radio frame record
    pub fn from_record(record: &RawRecord) -> Result<Self, FieldError> {
        let payload = record.get_str(APS_PAYLOAD_FIELD)?;
        // Only the low 8 bits are meaningful; truncation keeps gaps mod 256 intact
        let seq_a = record.parse_int(APS_COUNTER_FIELD)? as u8;
        let seq_b = zcl_sequence(payload)?;
        Ok(Self { seq_a, seq_b })
    }

    /// A zero ZCL sequence number usually means the device just rebooted
    pub fn looks_like_reset(&self) -> bool {
        self.seq_b == 0
    }
}

/// ZCL transaction sequence number from the APS payload hex text
///
/// Byte 0 is the frame-control byte. The sequence number is byte 1, or
/// byte 3 when a manufacturer code sits in between.
pub fn zcl_sequence(payload: &str) -> Result<u8, FieldError> {
    let hex = payload
        .strip_prefix("0x")
        .or_else(|| payload.strip_prefix("0X"))
        .unwrap_or(payload);

    let frame_control = hex_byte(hex, 0)?;
    let index = if frame_control & MANUFACTURER_SPECIFIC != 0 {
        3
    } else {
        1
    };
    hex_byte(hex, index)
}

/// Byte `index` of a hex string, ignoring anything after it
fn hex_byte(hex: &str, index: usize) -> Result<u8, FieldError> {
    let start = index * 2;
    let digits = hex.get(start..start + 2).ok_or(FieldError::TooShort {
        field: APS_PAYLOAD_FIELD,
        needed: index,
        available: hex.len() / 2,
    })?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(FieldError::InvalidHex {
            field: APS_PAYLOAD_FIELD,
            index,
        });
    }
    u8::from_str_radix(digits, 16).map_err(|_| FieldError::InvalidHex {
        field: APS_PAYLOAD_FIELD,
        index,
    })
}

/// Messages lost between the previous frame and `sample`
///
/// `None` when there is no previous frame or the sample looks like a
/// device reset; otherwise the smaller of the two modular gaps.
pub fn estimate_loss(last: Option<SequenceState>, sample: SequenceSample) -> Option<u8> {
    let last = last?;
    if sample.looks_like_reset() {
        return None;
    }
    Some(
        modular_gap(sample.seq_a, last.seq1).min(modular_gap(sample.seq_b, last.seq2)),
    )
}

/// Apply one frame's sequence numbers to an entity's extra-state
///
/// Adds the loss estimate to `msg_missed` and always remembers the sample
/// as the new baseline. Returns the loss counted for this frame.
pub fn observe(extra: &mut ExtraState, sample: SequenceSample) -> u8 {
    let lost = estimate_loss(extra.last_seq, sample).unwrap_or(0);
    if lost > 0 {
        extra.record_missed(u64::from(lost));
    }
    extra.last_seq = Some(SequenceState {
        seq1: sample.seq_a,
        seq2: sample.seq_b,
    });
    lost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seq_a: u8, seq_b: u8) -> SequenceSample {
        SequenceSample { seq_a, seq_b }
    }

    #[test]
    fn test_modular_gap() {
        assert_eq!(modular_gap(6, 5), 0);
        assert_eq!(modular_gap(7, 5), 1);
        assert_eq!(modular_gap(0, 255), 0);
        assert_eq!(modular_gap(2, 250), 7);
        // Same number twice reads as a full wrap
        assert_eq!(modular_gap(5, 5), 255);
    }

    #[test]
    fn test_zcl_sequence_plain() {
        // frame control 0x18, seq 0x2a, command 0x0a
        assert_eq!(zcl_sequence("0x182a0a"), Ok(0x2a));
        assert_eq!(zcl_sequence("182a0a"), Ok(0x2a));
    }

    #[test]
    fn test_zcl_sequence_manufacturer_specific() {
        // frame control 0x1c, manufacturer 0x115f, seq 0x07
        assert_eq!(zcl_sequence("0x1c5f11070a"), Ok(0x07));
    }

    #[test]
    fn test_zcl_sequence_malformed() {
        assert!(matches!(zcl_sequence("0x18"), Err(FieldError::TooShort { .. })));
        assert!(matches!(zcl_sequence("0x1c5f11"), Err(FieldError::TooShort { .. })));
        assert!(matches!(zcl_sequence("0xzz2a"), Err(FieldError::InvalidHex { index: 0, .. })));
        assert!(matches!(zcl_sequence("0x18+a"), Err(FieldError::InvalidHex { index: 1, .. })));
        assert!(zcl_sequence("").is_err());
    }

    #[test]
    fn test_zcl_sequence_ignores_trailing_garbage() {
        assert_eq!(zcl_sequence("0x182aXYZ"), Ok(0x2a));
    }

    #[test]
    fn test_estimate_takes_minimum() {
        let last = Some(SequenceState { seq1: 5, seq2: 10 });
        assert_eq!(estimate_loss(last, sample(7, 12)), Some(1));
        assert_eq!(estimate_loss(last, sample(9, 11)), Some(0));
        assert_eq!(estimate_loss(last, sample(6, 20)), Some(0));
        assert_eq!(estimate_loss(last, sample(20, 14)), Some(3));
    }

    #[test]
    fn test_estimate_skips_first_and_reset() {
        assert_eq!(estimate_loss(None, sample(7, 12)), None);
        let last = Some(SequenceState { seq1: 5, seq2: 10 });
        assert_eq!(estimate_loss(last, sample(9, 0)), None);
    }

    #[test]
    fn test_observe_updates_baseline_on_reset() {
        let mut extra = ExtraState {
            msg_missed: Some(0),
            last_seq: Some(SequenceState { seq1: 5, seq2: 10 }),
            ..Default::default()
        };
        assert_eq!(observe(&mut extra, sample(40, 0)), 0);
        assert_eq!(extra.msg_missed, Some(0));
        assert_eq!(extra.last_seq, Some(SequenceState { seq1: 40, seq2: 0 }));
    }

    #[test]
    fn test_sample_from_record() {
        let record = RawRecord::new()
            .with(APS_COUNTER_FIELD, "0x2F")
            .with(APS_PAYLOAD_FIELD, "0x18110a");
        assert_eq!(SequenceSample::from_record(&record), Ok(sample(0x2f, 0x11)));

        let wide = RawRecord::new()
            .with(APS_COUNTER_FIELD, "300")
            .with(APS_PAYLOAD_FIELD, "0x18110a");
        assert_eq!(SequenceSample::from_record(&wide).unwrap().seq_a, 44);

        let missing = RawRecord::new().with(APS_PAYLOAD_FIELD, "0x18110a");
        assert_eq!(
            SequenceSample::from_record(&missing),
            Err(FieldError::Missing(APS_COUNTER_FIELD))
        );
    }
}
