//! # gwstats - Radio gateway link statistics
//!
//! Turns the raw telemetry a Zigbee/BLE gateway emits into flat per-device
//! attribute snapshots: gateway health, serial-port counters, per-device
//! message counters and an estimate of lost Zigbee messages.
//!
//! ## Key Features
//!
//! - **Three decoders**: gateway, Zigbee link and BLE statistics
//! - **Loss estimation**: two independent 8-bit sequence counters per frame,
//!   the smaller modular gap is counted as lost
//! - **Fault tolerant**: malformed fields drop attributes, never the event
//! - **Typed extra-state**: per-device counters survive across events
//!
//! ## Quick Start
//!
//! ```rust
//! use gwstats::{Dispatcher, EntityKind, RawRecord, StatsConfig};
//! use serde_json::json;
//!
//! let mut dispatcher = Dispatcher::new(StatsConfig::default()).unwrap();
//! dispatcher.register_entity("gw", EntityKind::Gateway, "54:ef:44:00:11:22").unwrap();
//!
//! let record = RawRecord::new()
//!     .with("free_mem", 4096)
//!     .with("load_avg", "0.10|0.12|0.09")
//!     .with("rssi", 60)
//!     .with("run_time", 90061);
//!
//! let payload = dispatcher.dispatch("gw", &record).unwrap();
//! assert_eq!(payload.get("rssi"), Some(&json!(-40)));
//! assert_eq!(payload.get("uptime"), Some(&json!("1 days, 01:01:01")));
//! ```
//!
//! ## Modules
//!
//! - [`decoder`]: the three stats decoders
//! - [`sequence`]: message-loss estimation
//! - [`registry`]: decoder registry and dispatcher
//! - [`store`]: per-entity extra-state store
//! - [`record`]: raw records and output payloads
//! - [`cluster`]: Zigbee cluster names
//! - [`clock`]: timestamps

// Modules
pub mod clock;
pub mod cluster;
pub mod config;
pub mod decoder;
pub mod entity;
pub mod error;
pub mod record;
pub mod registry;
pub mod sequence;
pub mod store;

// Re-exports for convenient access
pub use clock::{format_timestamp, Clock, FixedClock, SystemClock};
pub use cluster::{cluster_name, ClusterLabel};
pub use config::{AttrConfig, StatsConfig, StoreConfig};
pub use decoder::{Decoder, GatewayStats, RadioLinkStats, ShortRangeStats};
pub use entity::{Entity, EntityId, EntityKind, ExtraState, SequenceState};
pub use error::{FieldError, Result, StatsError};
pub use record::{Payload, RawRecord};
pub use registry::{DecoderRegistry, Dispatcher};
pub use sequence::{estimate_loss, modular_gap, SequenceSample};
pub use store::EntityStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
