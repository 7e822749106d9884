//! Zone catalog, suffix index and change scheduling for an authoritative
//! DNS server.
//!
//! This crate is the zone-resolution core of an authoritative server:
//! given an arbitrary query name it finds the most specific loaded zone
//! that is authoritative for it, while zones are being loaded, reloaded
//! and deleted concurrently with lookups, and it raises "zone changed"
//! notifications when a zone's scheduled serial timestamps are reached.
//!
//! It consists of four parts:
//!
//! * [`SuffixIndex`] — a hash-chained suffix index resolving a query name
//!   to the closest enclosing zone apex in one map probe per label,
//! * [`Catalog`] — the authoritative map from zone name to [`ZoneRecord`],
//! * a serial scheduler keeping exactly one armed timer per zone for its
//!   nearest future serial timestamp,
//! * [`ZoneManager`] — the single writer composing the three into
//!   linearized load/reload/delete operations and the timer lifecycle.
//!
//! All mutations go through the manager's queue and are applied one at a
//! time by its run task; reads go straight to the shared index and
//! catalog. DNS wire handling, resource record storage and zone transfer
//! are deliberately outside this crate; zone records arrive pre-normalized
//! and leave as opaque payloads.
//!
//! ```no_run
//! use authzone::{ZoneManager, ZoneName, ZoneRecord};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let (changed_tx, _changed_rx) = tokio::sync::mpsc::channel(16);
//! let manager = Arc::new(ZoneManager::new(changed_tx));
//! tokio::spawn({
//!     let manager = manager.clone();
//!     async move { manager.run().await }
//! });
//!
//! let record = ZoneRecord::new(
//!     ZoneName::new("example.com"),
//!     Default::default(),
//!     Vec::new(),
//!     Bytes::new(),
//! );
//! manager.load(record).await.unwrap();
//! assert_eq!(
//!     manager.zone_for_name("www.example.com"),
//!     Some(ZoneName::new("example.com"))
//! );
//! # }
//! ```

#![warn(missing_docs)]

mod catalog;
mod error;
mod index;
mod manager;
mod name;
mod scheduler;
mod types;

pub use self::catalog::Catalog;
pub use self::error::ZoneUpdateError;
pub use self::index::SuffixIndex;
pub use self::manager::ZoneManager;
pub use self::name::ZoneName;
pub use self::scheduler::TIMER_HORIZON;
pub use self::types::{
    MemoryReport, TsigKey, ZoneChanged, ZoneChangedCause, ZoneRecord,
};
