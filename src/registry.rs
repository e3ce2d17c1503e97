//! Decoder registry and dispatcher
//!
//! The [`DecoderRegistry`] is built once from a [`StatsConfig`] and owns the
//! decoders for every entity kind. The [`Dispatcher`] pairs it with the
//! [`EntityStore`] and a [`Clock`], and turns one raw record for one entity
//! into one merged [`Payload`].
//!
//! # Example
//!
//! ```rust
//! use gwstats::{Dispatcher, EntityKind, RawRecord, StatsConfig};
//! use serde_json::json;
//!
//! let mut dispatcher = Dispatcher::new(StatsConfig::default()).unwrap();
//! dispatcher
//!     .register_entity("0x00158d0001a2b3c4", EntityKind::RadioLink, "00158d0001a2b3c4")
//!     .unwrap();
//!
//! let record = RawRecord::new()
//!     .with("sourceAddress", "0x7A2F")
//!     .with("clusterId", "0x0006")
//!     .with("APSCounter", "0x05")
//!     .with("APSPlayload", "0x180a0a");
//!
//! let payload = dispatcher.dispatch("0x00158d0001a2b3c4", &record).unwrap();
//! assert_eq!(payload.get("msg_received"), Some(&json!(1)));
//! assert_eq!(payload.get("last_msg"), Some(&json!("OnOff")));
//! ```

use std::collections::BTreeSet;

use log::trace;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::config::StatsConfig;
use crate::decoder::Decoder;
use crate::entity::{Entity, EntityKind};
use crate::error::Result;
use crate::record::{Payload, RawRecord};
use crate::store::EntityStore;

/// Decoders by entity kind
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: Vec<Decoder>,
}

impl DecoderRegistry {
    /// Registry with no decoders
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    /// Registry with the standard decoder for every entity kind
    pub fn from_config(config: &StatsConfig) -> Self {
        Self {
            decoders: EntityKind::ALL
                .iter()
                .map(|&kind| Decoder::for_kind(kind, config))
                .collect(),
        }
    }

    /// Add a decoder
    pub fn register(&mut self, decoder: Decoder) {
        self.decoders.push(decoder);
    }

    /// Decoders serving `kind`, in registration order
    pub fn for_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Decoder> {
        self.decoders.iter().filter(move |d| d.kind() == kind)
    }

    /// All decoders
    pub fn iter(&self) -> impl Iterator<Item = &Decoder> {
        self.decoders.iter()
    }

    /// Every attribute an entity of `kind` can be given
    pub fn owned_attributes(&self, kind: EntityKind) -> BTreeSet<&str> {
        self.for_kind(kind)
            .flat_map(|d| std::iter::once(d.attr()).chain(d.childs().iter().copied()))
            .collect()
    }

    /// Number of decoders
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Check if no decoder is registered
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// Routes raw records through the decoders of their entity
///
/// Decoding mutates per-entity extra-state, so dispatch takes `&mut self`.
/// Hosts that share a dispatcher between tasks put it behind a lock, which
/// keeps all updates to one entity's counters serialized.
#[derive(Debug)]
pub struct Dispatcher<C: Clock = SystemClock> {
    registry: DecoderRegistry,
    store: EntityStore,
    clock: C,
}

impl Dispatcher<SystemClock> {
    /// Create a dispatcher using the system clock
    pub fn new(config: StatsConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Dispatcher<C> {
    /// Create a dispatcher with an explicit clock
    pub fn with_clock(config: StatsConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry: DecoderRegistry::from_config(&config),
            store: EntityStore::with_config(&config.store),
            clock,
        })
    }

    /// Create a dispatcher from prebuilt parts
    pub fn from_parts(registry: DecoderRegistry, store: EntityStore, clock: C) -> Self {
        Self {
            registry,
            store,
            clock,
        }
    }

    /// Make an entity known to the engine
    pub fn register_entity(
        &mut self,
        id: &str,
        kind: EntityKind,
        mac: impl Into<String>,
    ) -> Result<&Entity> {
        self.store.register(id, kind, mac).map(|e| &*e)
    }

    /// Decode one record for one entity
    ///
    /// Every decoder registered for the entity's kind that accepts the
    /// record writes into the same payload. Fails only when the entity is
    /// unknown; malformed fields just produce fewer attributes.
    pub fn dispatch(&mut self, entity_id: &str, record: &RawRecord) -> Result<Payload> {
        let entity = self.store.get_mut(entity_id)?;
        let mut payload = Payload::new();

        for decoder in self.registry.for_kind(entity.kind) {
            if decoder.accepts(record) {
                decoder.decode(entity, &mut payload, record, &self.clock);
            }
        }

        trace!(
            "{} {}: {} fields in, {} attributes out",
            entity.kind,
            entity_id,
            record.len(),
            payload.len()
        );
        Ok(payload)
    }

    /// Decode a JSON-delivered record
    pub fn dispatch_value(&mut self, entity_id: &str, value: Value) -> Result<Payload> {
        let record = RawRecord::try_from(value)?;
        self.dispatch(entity_id, &record)
    }

    /// The decoder registry
    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    /// The entity store
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Mutable access to the entity store
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    /// The clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Mutable access to the clock
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::decoder::ShortRangeStats;
    use crate::error::StatsError;
    use serde_json::json;

    fn dispatcher() -> Dispatcher<FixedClock> {
        let clock = FixedClock::parse("2024-03-01T12:00:00").unwrap();
        Dispatcher::with_clock(StatsConfig::default(), clock).unwrap()
    }

    #[test]
    fn test_registry_default_decoders() {
        let registry = DecoderRegistry::from_config(&StatsConfig::default());
        assert_eq!(registry.len(), 3);
        for kind in EntityKind::ALL {
            assert_eq!(registry.for_kind(kind).count(), 1);
        }
        assert!(DecoderRegistry::empty().is_empty());
    }

    #[test]
    fn test_owned_attributes() {
        let registry = DecoderRegistry::from_config(&StatsConfig::default());
        let ble: Vec<_> = registry.owned_attributes(EntityKind::ShortRange).into_iter().collect();
        assert_eq!(ble, vec!["ble", "mac", "msg_received"]);

        let zigbee = registry.owned_attributes(EntityKind::RadioLink);
        assert_eq!(zigbee.len(), 11);
        assert!(zigbee.contains("new_resets"));
        assert!(!zigbee.contains("uptime"));
    }

    #[test]
    fn test_dispatch_unknown_entity() {
        let mut d = dispatcher();
        let result = d.dispatch("ghost", &RawRecord::new());
        assert!(matches!(result, Err(StatsError::UnknownEntity(_))));
    }

    #[test]
    fn test_dispatch_routes_by_kind() {
        let mut d = dispatcher();
        d.register_entity("gw", EntityKind::Gateway, "").unwrap();
        d.register_entity("ble", EntityKind::ShortRange, "aa:bb").unwrap();

        // A Zigbee-shaped record means nothing to the gateway decoder
        let record = RawRecord::new().with("sourceAddress", "0x1234");
        assert!(d.dispatch("gw", &record).unwrap().is_empty());

        let payload = d.dispatch("ble", &record).unwrap();
        assert_eq!(payload.get("mac"), Some(&json!("aabb")));
    }

    #[test]
    fn test_dispatch_merges_decoders() {
        let mut registry = DecoderRegistry::empty();
        registry.register(Decoder::ShortRangeStats(ShortRangeStats::new("ble")));
        registry.register(Decoder::ShortRangeStats(ShortRangeStats::new("ble_seen")));

        let clock = FixedClock::parse("2024-03-01T12:00:00").unwrap();
        let mut d = Dispatcher::from_parts(registry, EntityStore::new(), clock);
        d.register_entity("ble", EntityKind::ShortRange, "aa").unwrap();

        let payload = d.dispatch("ble", &RawRecord::new()).unwrap();
        assert!(payload.contains("ble"));
        assert!(payload.contains("ble_seen"));
        // Both decoders counted, the later write wins
        assert_eq!(payload.get("msg_received"), Some(&json!(2)));
    }

    #[test]
    fn test_dispatch_value_rejects_non_object() {
        let mut d = dispatcher();
        d.register_entity("ble", EntityKind::ShortRange, "aa").unwrap();
        assert!(matches!(
            d.dispatch_value("ble", json!("nope")),
            Err(StatsError::NotAnObject("string"))
        ));
        assert!(d.dispatch_value("ble", json!({})).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = StatsConfig::default();
        config.attrs.gateway.clear();
        assert!(Dispatcher::new(config).is_err());
    }
}
