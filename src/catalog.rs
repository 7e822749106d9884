//! The zone catalog.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::name::ZoneName;
use crate::types::ZoneRecord;

//------------ Catalog -------------------------------------------------------

/// The authoritative map from zone name to its current record.
///
/// Records are stored behind an `Arc` and handed out by value, so a reader
/// keeps a consistent snapshot of a zone even while a reload replaces the
/// catalog entry. The catalog knows nothing about the suffix index or the
/// scheduler; keeping the three consistent is the zone manager's job.
#[derive(Debug, Default)]
pub struct Catalog {
    zones: RwLock<HashMap<ZoneName, Arc<ZoneRecord>>>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns whether a zone with this name is loaded.
    pub fn is_loaded(&self, name: &ZoneName) -> bool {
        self.zones.read().contains_key(name)
    }

    /// Returns the current record for a zone.
    pub fn get(&self, name: &ZoneName) -> Option<Arc<ZoneRecord>> {
        self.zones.read().get(name).cloned()
    }

    /// Stores a record under its own name, replacing any previous one.
    pub fn store(&self, record: ZoneRecord) {
        let name = record.name().clone();
        self.zones.write().insert(name, Arc::new(record));
    }

    /// Removes a zone's record. A no-op if the zone is not loaded.
    pub fn delete(&self, name: &ZoneName) {
        self.zones.write().remove(name);
    }

    /// Returns the number of loaded zones.
    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    /// Returns whether no zone is loaded.
    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }

    /// Approximate heap usage of the catalog in bytes.
    pub fn mem_usage(&self) -> usize {
        let zones = self.zones.read();
        zones
            .iter()
            .map(|(name, record)| {
                name.mem_usage()
                    + mem::size_of::<Arc<ZoneRecord>>()
                    + record.mem_usage()
            })
            .sum()
    }
}

//============ Tests =========================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::BTreeSet;

    fn record(name: &str) -> ZoneRecord {
        ZoneRecord::new(
            ZoneName::new(name),
            BTreeSet::new(),
            Vec::new(),
            Bytes::from_static(b"zone data"),
        )
    }

    #[test]
    fn store_get_delete_round_trip() {
        let catalog = Catalog::new();
        let name = ZoneName::new("example.com");

        assert!(!catalog.is_loaded(&name));
        catalog.store(record("example.com"));
        assert!(catalog.is_loaded(&name));
        assert_eq!(catalog.get(&name).unwrap().name(), &name);

        catalog.delete(&name);
        assert!(!catalog.is_loaded(&name));
        assert!(catalog.get(&name).is_none());

        // Deleting again stays a no-op.
        catalog.delete(&name);
    }

    #[test]
    fn store_is_an_upsert() {
        let catalog = Catalog::new();
        let name = ZoneName::new("example.com");
        catalog.store(record("example.com"));
        let first = catalog.get(&name).unwrap();

        let replacement = ZoneRecord::new(
            name.clone(),
            BTreeSet::from([1_700_000_000]),
            Vec::new(),
            Bytes::from_static(b"new data"),
        );
        catalog.store(replacement);
        assert_eq!(catalog.len(), 1);
        let second = catalog.get(&name).unwrap();
        assert_eq!(second.serials().len(), 1);

        // The old handle still sees the old record.
        assert!(first.serials().is_empty());
    }

    #[test]
    fn mem_usage_shrinks_after_delete() {
        let catalog = Catalog::new();
        catalog.store(record("example.com"));
        catalog.store(record("example.org"));
        let both = catalog.mem_usage();
        catalog.delete(&ZoneName::new("example.org"));
        assert!(catalog.mem_usage() < both);
        catalog.delete(&ZoneName::new("example.com"));
        assert_eq!(catalog.mem_usage(), 0);
    }
}
