//! Gateway stats decoder

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;

use crate::record::{Payload, RawRecord};

/// Attributes the gateway decoder may write
pub const GATEWAY_CHILDS: &[&str] = &[
    "network_pan_id",
    "radio_tx_power",
    "radio_channel",
    "free_mem",
    "load_avg",
    "rssi",
    "uptime",
    "bluetooth_tx",
    "bluetooth_rx",
    "bluetooth_oe",
    "bluetooth_fe",
    "bluetooth_brk",
    "zigbee_tx",
    "zigbee_rx",
    "zigbee_oe",
    "zigbee_fe",
    "zigbee_brk",
];

/// Serial blob line with the BLE UART counters
const BLUETOOTH_LINE: usize = 2;
/// Serial blob line with the Zigbee UART counters
const ZIGBEE_LINE: usize = 3;

lazy_static! {
    static ref SERIAL_COUNTER: Regex =
        Regex::new(r"(tx|rx|oe|fe|brk):(\d+)").expect("serial counter pattern is valid");
}

/// Decoder for the gateway's own health and radio reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStats {
    attr: String,
    rssi_offset: i64,
}

impl GatewayStats {
    /// Create a decoder for attribute `attr`
    pub fn new(attr: impl Into<String>, rssi_offset: i64) -> Self {
        Self {
            attr: attr.into(),
            rssi_offset,
        }
    }

    /// Configured attribute key
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Whether the record carries anything this decoder reads
    pub fn accepts(&self, record: &RawRecord) -> bool {
        record.contains(&self.attr)
            || record.contains("networkUp")
            || record.contains("free_mem")
            || record.contains("serial")
    }

    /// Decode one gateway record into `payload`
    pub fn decode(&self, payload: &mut Payload, record: &RawRecord) {
        if let Some(value) = record.get(&self.attr) {
            payload.insert(self.attr.as_str(), value.clone());
        }

        if record.contains("networkUp") {
            payload.insert("network_pan_id", record.get_or_null("networkPanId"));
            payload.insert("radio_tx_power", record.get_or_null("radioTxPower"));
            payload.insert("radio_channel", record.get_or_null("radioChannel"));
        }

        if record.contains("free_mem") {
            self.decode_health(payload, record);
        }

        match record.get("serial") {
            Some(Value::String(serial)) => decode_serial(payload, serial),
            Some(_) => debug!("gateway serial counters are not text, skipped"),
            None => {}
        }
    }

    fn decode_health(&self, payload: &mut Payload, record: &RawRecord) {
        payload.insert("free_mem", record.get_or_null("free_mem"));
        payload.insert("load_avg", record.get_or_null("load_avg"));

        match record.get("rssi").and_then(|v| offset_number(v, self.rssi_offset)) {
            Some(rssi) => payload.insert("rssi", rssi),
            None => debug!("gateway rssi missing or not a number, skipped"),
        }

        match record.get_i64("run_time").map(u64::try_from) {
            Ok(Ok(secs)) => payload.insert("uptime", format_uptime(secs)),
            Ok(Err(_)) => debug!("gateway run_time is negative, skipped"),
            Err(e) => debug!("gateway uptime skipped: {}", e),
        }
    }
}

/// Subtract `offset` from a JSON number, keeping integers integral
fn offset_number(value: &Value, offset: i64) -> Option<Value> {
    if let Some(i) = value.as_i64() {
        return Some(Value::from(i.saturating_sub(offset)));
    }
    value.as_f64().map(|f| Value::from(f - offset as f64))
}

/// Format seconds of uptime as `"<days> days, HH:MM:SS"`
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = secs % 86_400 / 3600;
    let minutes = secs % 3600 / 60;
    let seconds = secs % 60;
    format!("{} days, {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Extract `label:count` pairs from one serial counter line
pub fn parse_serial_line(line: &str) -> Vec<(&str, u64)> {
    SERIAL_COUNTER
        .captures_iter(line)
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str();
            let count = caps.get(2)?.as_str().parse().ok()?;
            Some((label, count))
        })
        .collect()
}

fn decode_serial(payload: &mut Payload, serial: &str) {
    let lines: Vec<&str> = serial.split('\n').collect();

    for (index, domain) in [(BLUETOOTH_LINE, "bluetooth"), (ZIGBEE_LINE, "zigbee")] {
        let Some(line) = lines.get(index) else {
            debug!("gateway serial blob has no line {}, {} counters skipped", index, domain);
            continue;
        };
        for (label, count) in parse_serial_line(line) {
            payload.insert(format!("{}_{}", domain, label), count);
        }
    }
}
