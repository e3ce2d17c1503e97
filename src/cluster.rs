//! Zigbee cluster name table
//!
//! Maps the 16-bit cluster id carried by a radio frame to the short label
//! shown as `last_msg`.

use serde_json::Value;

/// Known clusters, sorted by id
const CLUSTERS: &[(u16, &str)] = &[
    (0x0000, "Basic"),
    (0x0001, "PowerCfg"),
    (0x0003, "Identify"),
    (0x0006, "OnOff"),
    (0x0008, "LevelCtrl"),
    (0x000A, "Time"),
    (0x000C, "AnalogInput"), // cube, gas sensor
    (0x0012, "Multistate"),
    (0x0019, "OTA"), // illuminance sensor
    (0x0101, "DoorLock"),
    (0x0400, "Illuminance"), // motion sensor
    (0x0402, "Temperature"),
    (0x0403, "Pressure"),
    (0x0405, "Humidity"),
    (0x0406, "Occupancy"), // motion sensor
    (0x0500, "IasZone"),   // gas sensor
    (0x0B04, "ElectrMeasur"),
    (0xFCC0, "Xiaomi"),
];

/// Look up the label of a cluster id
pub fn cluster_name(id: i64) -> Option<&'static str> {
    let id = u16::try_from(id).ok()?;
    CLUSTERS
        .binary_search_by_key(&id, |&(cid, _)| cid)
        .ok()
        .map(|i| CLUSTERS[i].1)
}

/// Resolved cluster: a known label, or the raw id passed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLabel {
    /// Cluster present in the table
    Named(&'static str),
    /// Unknown cluster id
    Raw(i64),
}

impl ClusterLabel {
    /// Resolve a cluster id against the table
    pub fn resolve(id: i64) -> Self {
        match cluster_name(id) {
            Some(name) => Self::Named(name),
            None => Self::Raw(id),
        }
    }
}

impl From<ClusterLabel> for Value {
    fn from(label: ClusterLabel) -> Self {
        match label {
            ClusterLabel::Named(name) => Value::from(name),
            ClusterLabel::Raw(id) => Value::from(id),
        }
    }
}

impl std::fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Raw(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(CLUSTERS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_known_clusters() {
        assert_eq!(cluster_name(0x0006), Some("OnOff"));
        assert_eq!(cluster_name(0x0000), Some("Basic"));
        assert_eq!(cluster_name(0xFCC0), Some("Xiaomi"));
        assert_eq!(cluster_name(0x0B04), Some("ElectrMeasur"));
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(ClusterLabel::resolve(0x9999), ClusterLabel::Raw(39321));
        assert_eq!(Value::from(ClusterLabel::resolve(0x9999)), Value::from(39321));
        assert_eq!(Value::from(ClusterLabel::resolve(6)), Value::from("OnOff"));
    }

    #[test]
    fn test_out_of_range_ids() {
        assert_eq!(cluster_name(-1), None);
        assert_eq!(cluster_name(0x1_0006), None);
        assert_eq!(ClusterLabel::resolve(0x1_0006).to_string(), "65542");
    }
}
