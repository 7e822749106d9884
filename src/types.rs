//! Record and event types shared across the crate.

use std::collections::BTreeSet;
use std::mem;

use bytes::Bytes;
use serde::Serialize;

use crate::name::ZoneName;

//------------ TsigKey -------------------------------------------------------

/// A named TSIG key attached to a zone.
///
/// Keys are validated and normalized by the layer that prepares zone
/// records; this crate only stores them and looks them up by identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TsigKey {
    /// The key identifier, without the zone name.
    name: Box<str>,

    /// The shared secret.
    secret: Bytes,

    /// The HMAC algorithm in its mnemonic form, e.g. `hmac-sha256`.
    algorithm: Box<str>,
}

impl TsigKey {
    /// Creates a new key entry.
    pub fn new(name: &str, secret: Bytes, algorithm: &str) -> Self {
        TsigKey {
            name: name.to_ascii_lowercase().into(),
            secret,
            algorithm: algorithm.to_ascii_lowercase().into(),
        }
    }

    /// Returns the key identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared secret.
    pub fn secret(&self) -> &Bytes {
        &self.secret
    }

    /// Returns the algorithm mnemonic.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn mem_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.name.len()
            + self.secret.len()
            + self.algorithm.len()
    }
}

//------------ ZoneRecord ----------------------------------------------------

/// The authoritative record for a single loaded zone.
///
/// Records are produced by an external prepare step and stored wholesale in
/// the catalog; a reload replaces the previous record rather than mutating
/// it. The resource record data itself is opaque to the zone-resolution
/// core and travels along as raw bytes.
#[derive(Clone, Debug)]
pub struct ZoneRecord {
    /// The apex name of the zone.
    name: ZoneName,

    /// Future points in time (unix seconds) at which the zone's state is
    /// scheduled to change, e.g. a key rollover becoming effective.
    serials: BTreeSet<u64>,

    /// The TSIG keys that authenticate transfers and updates for this zone.
    tsig_keys: Vec<TsigKey>,

    /// The prepared zone data, not interpreted here.
    payload: Bytes,
}

impl ZoneRecord {
    /// Creates a record from its prepared parts.
    pub fn new(
        name: ZoneName,
        serials: BTreeSet<u64>,
        tsig_keys: Vec<TsigKey>,
        payload: Bytes,
    ) -> Self {
        ZoneRecord {
            name,
            serials,
            tsig_keys,
            payload,
        }
    }

    /// Returns the apex name of the zone.
    pub fn name(&self) -> &ZoneName {
        &self.name
    }

    /// Returns the scheduled change timestamps.
    pub fn serials(&self) -> &BTreeSet<u64> {
        &self.serials
    }

    /// Returns the zone's TSIG keys.
    pub fn tsig_keys(&self) -> &[TsigKey] {
        &self.tsig_keys
    }

    /// Returns the opaque zone payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Looks up a TSIG key by its identifier.
    pub fn find_key(&self, ident: &str) -> Option<&TsigKey> {
        self.tsig_keys
            .iter()
            .find(|key| key.name().eq_ignore_ascii_case(ident))
    }

    /// Approximate heap usage of the record in bytes.
    pub(crate) fn mem_usage(&self) -> usize {
        mem::size_of::<Self>()
            + self.name.mem_usage()
            + self.serials.len() * mem::size_of::<u64>()
            + self.tsig_keys.iter().map(TsigKey::mem_usage).sum::<usize>()
            + self.payload.len()
    }
}

//------------ ZoneChangedCause ----------------------------------------------

/// Why a zone changed notification was emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ZoneChangedCause {
    /// The zone was loaded for the first time.
    Loaded,

    /// The zone's record was replaced.
    Reloaded,

    /// A scheduled serial timestamp was reached.
    SerialElapsed,
}

//------------ ZoneChanged ---------------------------------------------------

/// Notification that a zone's data is no longer what it was.
///
/// Delivered to the subscriber handed to the manager at construction time,
/// which is expected to invalidate any live queries against the zone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ZoneChanged {
    /// The apex name of the changed zone.
    pub name: ZoneName,

    /// What triggered the notification.
    pub cause: ZoneChangedCause,
}

//------------ MemoryReport --------------------------------------------------

/// Approximate memory usage of the core's tables.
///
/// Purely diagnostic; the figures count heap payload and per-entry
/// overhead, not allocator slack.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MemoryReport {
    /// Bytes held by the suffix index's node table.
    pub index_bytes: usize,

    /// Bytes held by the zone catalog.
    pub catalog_bytes: usize,

    /// Bytes held by the serial scheduler's watches and timers.
    pub scheduler_bytes: usize,

    /// Sum of the per-table figures.
    pub total_bytes: usize,
}

//============ Tests =========================================================
