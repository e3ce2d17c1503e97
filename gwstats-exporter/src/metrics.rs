// gwstats Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for gateway link statistics.
//!
//! This module defines all Prometheus metrics exposed by the exporter
//! and maps decoded payload attributes onto them.

use gwstats::{EntityKind, Payload};
use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_gauge_vec, register_int_counter, Encoder, Gauge, GaugeVec,
    IntCounter, TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================
    // Per-device link metrics
    // ============================================================

    /// Messages received per device since the exporter started.
    pub static ref MSG_RECEIVED: GaugeVec = register_gauge_vec!(
        "gwstats_msg_received",
        "Messages received from a device",
        &["entity", "kind"]
    ).unwrap();

    /// Estimated Zigbee messages lost per device.
    pub static ref MSG_MISSED: GaugeVec = register_gauge_vec!(
        "gwstats_msg_missed",
        "Estimated messages lost from a Zigbee device",
        &["entity"]
    ).unwrap();

    /// Link quality indicator of the last frame (0-255).
    pub static ref LINK_QUALITY: GaugeVec = register_gauge_vec!(
        "gwstats_link_quality",
        "Link quality of the last Zigbee frame",
        &["entity"]
    ).unwrap();

    /// Signal strength of the last frame in dBm.
    pub static ref RSSI: GaugeVec = register_gauge_vec!(
        "gwstats_rssi",
        "Signal strength of the last Zigbee frame (dBm)",
        &["entity"]
    ).unwrap();

    /// Device resets since the exporter first saw the device.
    pub static ref NEW_RESETS: GaugeVec = register_gauge_vec!(
        "gwstats_new_resets",
        "Device resets since first observation",
        &["entity"]
    ).unwrap();

    // ============================================================
    // Gateway health metrics
    // ============================================================

    /// Free memory reported by the gateway.
    pub static ref GATEWAY_FREE_MEM: GaugeVec = register_gauge_vec!(
        "gwstats_gateway_free_mem",
        "Free memory reported by the gateway (KiB)",
        &["entity"]
    ).unwrap();

    /// One-minute load average of the gateway.
    pub static ref GATEWAY_LOAD_AVG: GaugeVec = register_gauge_vec!(
        "gwstats_gateway_load_avg",
        "One-minute load average of the gateway",
        &["entity"]
    ).unwrap();

    /// Wi-Fi signal strength of the gateway.
    pub static ref GATEWAY_RSSI: GaugeVec = register_gauge_vec!(
        "gwstats_gateway_rssi",
        "Wi-Fi signal strength of the gateway",
        &["entity"]
    ).unwrap();

    /// UART counters of the gateway's radio chips.
    pub static ref SERIAL_COUNTER: GaugeVec = register_gauge_vec!(
        "gwstats_serial_counter",
        "UART counters of the gateway radio chips",
        &["entity", "domain", "label"]
    ).unwrap();

    // ============================================================
    // Exporter Metrics
    // ============================================================

    /// Total records dispatched by the exporter.
    pub static ref RECORDS_TOTAL: IntCounter = register_int_counter!(
        "gwstats_exporter_records_total",
        "Total records dispatched by the exporter"
    ).unwrap();

    /// Records the engine refused (unknown entity, bad shape).
    pub static ref DISPATCH_ERRORS_TOTAL: IntCounter = register_int_counter!(
        "gwstats_exporter_dispatch_errors_total",
        "Records that could not be dispatched"
    ).unwrap();

    /// Current replay position (record index).
    pub static ref REPLAY_POSITION: Gauge = register_gauge!(
        "gwstats_exporter_replay_position",
        "Current replay position (record index)"
    ).unwrap();

    /// Total records in the replay file.
    pub static ref REPLAY_TOTAL_RECORDS: Gauge = register_gauge!(
        "gwstats_exporter_replay_total_records",
        "Total records in the replay file"
    ).unwrap();

    /// Replay speed multiplier.
    pub static ref REPLAY_SPEED: Gauge = register_gauge!(
        "gwstats_exporter_replay_speed",
        "Replay speed multiplier"
    ).unwrap();
}

/// Serial counter domains reported by the gateway.
const SERIAL_DOMAINS: [&str; 2] = ["bluetooth", "zigbee"];

/// Update every metric a payload has a value for.
pub fn update_from_payload(entity: &str, kind: EntityKind, payload: &Payload) {
    for (key, value) in payload.iter() {
        if key == "load_avg" {
            if let Some(load) = value.as_str().and_then(first_load_average) {
                GATEWAY_LOAD_AVG.with_label_values(&[entity]).set(load);
            }
            continue;
        }

        let Some(number) = value.as_f64() else {
            continue;
        };

        match (kind, key.as_str()) {
            (_, "msg_received") => MSG_RECEIVED
                .with_label_values(&[entity, kind.as_str()])
                .set(number),
            (_, "msg_missed") => MSG_MISSED.with_label_values(&[entity]).set(number),
            (_, "linkquality") => LINK_QUALITY.with_label_values(&[entity]).set(number),
            (_, "new_resets") => NEW_RESETS.with_label_values(&[entity]).set(number),
            (EntityKind::Gateway, "rssi") => GATEWAY_RSSI.with_label_values(&[entity]).set(number),
            (_, "rssi") => RSSI.with_label_values(&[entity]).set(number),
            (EntityKind::Gateway, "free_mem") => {
                GATEWAY_FREE_MEM.with_label_values(&[entity]).set(number)
            }
            (EntityKind::Gateway, other) => update_serial_counter(entity, other, number),
            _ => {}
        }
    }
}

fn update_serial_counter(entity: &str, key: &str, count: f64) {
    if let Some((domain, label)) = key.split_once('_') {
        if SERIAL_DOMAINS.contains(&domain) {
            SERIAL_COUNTER
                .with_label_values(&[entity, domain, label])
                .set(count);
        }
    }
}

/// First figure of a `"1.43|1.41|1.38|..."` or `"1.43 1.41 1.38"` load string.
fn first_load_average(text: &str) -> Option<f64> {
    text.split(|c: char| c == '|' || c.is_whitespace())
        .find(|s| !s.is_empty())?
        .parse()
        .ok()
}

/// Count one dispatched record.
pub fn record_dispatched(ok: bool) {
    RECORDS_TOTAL.inc();
    if !ok {
        DISPATCH_ERRORS_TOTAL.inc();
    }
}

/// Update replay position metrics.
pub fn update_replay_metrics(position: usize, total: usize, speed: f64) {
    REPLAY_POSITION.set(position as f64);
    REPLAY_TOTAL_RECORDS.set(total as f64);
    REPLAY_SPEED.set(speed);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
