//! The zone manager: the single writer over catalog, index and scheduler.

use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, trace};

use crate::catalog::Catalog;
use crate::error::ZoneUpdateError;
use crate::index::SuffixIndex;
use crate::name::ZoneName;
use crate::scheduler::{SerialFired, SerialScheduler};
use crate::types::{
    MemoryReport, TsigKey, ZoneChanged, ZoneChangedCause, ZoneRecord,
};

/// Length of the command queue feeding the run task.
const CMD_QUEUE_LEN: usize = 128;

//------------ Cmd -----------------------------------------------------------

/// A mutating operation queued for the run task.
enum Cmd {
    Load {
        zone: Box<ZoneRecord>,
        tx: oneshot::Sender<Result<(), ZoneUpdateError>>,
    },

    Reload {
        zone: Box<ZoneRecord>,
        tx: oneshot::Sender<()>,
    },

    Delete {
        name: ZoneName,
        tx: oneshot::Sender<Result<(), ZoneUpdateError>>,
    },

    MemoryReport {
        tx: oneshot::Sender<MemoryReport>,
    },
}

//------------ ZoneManager ---------------------------------------------------

/// The zone-resolution core of an authoritative server.
///
/// The manager owns the zone catalog, the suffix index and the serial
/// scheduler and is the only component that mutates them. Mutating calls
/// ([`load`], [`reload`], [`delete`]) are queued onto a single task driven
/// by [`run`] and processed strictly in arrival order, which is what makes
/// a delete and a concurrently firing serial timer for the same zone safe
/// without any further locking.
///
/// The read-side query surface ([`zone_for_name`], [`get_zone`],
/// [`find_zone`], [`get_key`]) bypasses the queue entirely and reads the
/// shared structures directly; a reader observes either the pre- or the
/// post-mutation state of any entry it touches.
///
/// Whenever a zone's data changes, a [`ZoneChanged`] notification is sent
/// to the subscriber channel handed to [`new`]. The subscriber is expected
/// to invalidate live queries against the zone; a subscriber that has gone
/// away is logged and otherwise ignored.
///
/// [`load`]: ZoneManager::load
/// [`reload`]: ZoneManager::reload
/// [`delete`]: ZoneManager::delete
/// [`run`]: ZoneManager::run
/// [`zone_for_name`]: ZoneManager::zone_for_name
/// [`get_zone`]: ZoneManager::get_zone
/// [`find_zone`]: ZoneManager::find_zone
/// [`get_key`]: ZoneManager::get_key
/// [`new`]: ZoneManager::new
#[derive(Debug)]
pub struct ZoneManager {
    catalog: Arc<Catalog>,
    index: Arc<SuffixIndex>,
    cmd_tx: Sender<Cmd>,
    cmd_rx: Mutex<Receiver<Cmd>>,
    changed_tx: Sender<ZoneChanged>,
}

impl ZoneManager {
    /// Creates a manager that notifies the given subscriber of changes.
    pub fn new(changed_tx: Sender<ZoneChanged>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_QUEUE_LEN);
        ZoneManager {
            catalog: Arc::new(Catalog::new()),
            index: Arc::new(SuffixIndex::new()),
            cmd_tx,
            cmd_rx: Mutex::new(cmd_rx),
            changed_tx,
        }
    }

    /// Runs the manager.
    ///
    /// Mutating calls only make progress while this future is being
    /// polled; typically it is spawned onto a task of its own right after
    /// construction and runs for the life of the process.
    pub async fn run(&self) {
        let mut cmd_rx = self.cmd_rx.lock().await;
        let mut scheduler = SerialScheduler::new();

        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        // All senders are gone, so no operation can ever
                        // arrive again.
                        break;
                    };
                    self.handle_cmd(cmd, &mut scheduler).await;
                }

                Some(fired) = scheduler.next_fired() => {
                    self.handle_fired(fired, &mut scheduler).await;
                }
            }
        }
    }

    //--- Mutating operations

    /// Loads a new zone.
    ///
    /// Fails with [`ZoneUpdateError::AlreadyLoaded`] if a zone with this
    /// name is present, leaving all existing state untouched.
    pub async fn load(
        &self,
        zone: ZoneRecord,
    ) -> Result<(), ZoneUpdateError> {
        let (tx, rx) = oneshot::channel();
        self.send_cmd(Cmd::Load {
            zone: Box::new(zone),
            tx,
        })
        .await?;
        rx.await.map_err(|_| ZoneUpdateError::Shutdown)?
    }

    /// Loads or replaces a zone.
    ///
    /// Unlike [`load`] this always succeeds for a well-formed record,
    /// whether or not the zone was present before.
    ///
    /// [`load`]: Self::load
    pub async fn reload(
        &self,
        zone: ZoneRecord,
    ) -> Result<(), ZoneUpdateError> {
        let (tx, rx) = oneshot::channel();
        self.send_cmd(Cmd::Reload {
            zone: Box::new(zone),
            tx,
        })
        .await?;
        rx.await.map_err(|_| ZoneUpdateError::Shutdown)
    }

    /// Deletes a zone.
    ///
    /// Fails with [`ZoneUpdateError::NotLoaded`] if no zone with this name
    /// is present.
    pub async fn delete(
        &self,
        name: &ZoneName,
    ) -> Result<(), ZoneUpdateError> {
        let (tx, rx) = oneshot::channel();
        self.send_cmd(Cmd::Delete {
            name: name.clone(),
            tx,
        })
        .await?;
        rx.await.map_err(|_| ZoneUpdateError::Shutdown)?
    }

    /// Reports the approximate memory usage of the core's tables.
    pub async fn memory_report(
        &self,
    ) -> Result<MemoryReport, ZoneUpdateError> {
        let (tx, rx) = oneshot::channel();
        self.send_cmd(Cmd::MemoryReport { tx }).await?;
        rx.await.map_err(|_| ZoneUpdateError::Shutdown)
    }

    async fn send_cmd(&self, cmd: Cmd) -> Result<(), ZoneUpdateError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| ZoneUpdateError::Shutdown)
    }

    //--- Queries

    /// Returns the apex of the closest enclosing loaded zone, if any.
    pub fn zone_for_name(&self, qname: &str) -> Option<ZoneName> {
        self.index.lookup(&ZoneName::new(qname))
    }

    /// Returns the record of the zone with exactly this apex name.
    pub fn get_zone(&self, apex: &str) -> Option<Arc<ZoneRecord>> {
        self.catalog.get(&ZoneName::new(apex))
    }

    /// Returns the record of the closest enclosing loaded zone.
    pub fn find_zone(&self, qname: &str) -> Option<Arc<ZoneRecord>> {
        let apex = self.zone_for_name(qname)?;
        self.catalog.get(&apex)
    }

    /// Looks up a TSIG key by its fully qualified name.
    ///
    /// The leftmost label is the key identifier and the remainder the
    /// candidate zone name, which is matched against the catalog directly
    /// rather than through the suffix index.
    pub fn get_key(&self, fqdn: &str) -> Option<(ZoneName, TsigKey)> {
        let fqdn = ZoneName::new(fqdn);
        let (ident, zone_name) = fqdn.split_first()?;
        let zone = self.catalog.get(&zone_name)?;
        let key = zone.find_key(ident)?.clone();
        Some((zone_name, key))
    }

    /// Returns the zone catalog for direct read access.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the suffix index for direct read access.
    pub fn index(&self) -> &SuffixIndex {
        &self.index
    }

    //--- The run task's side of the operations

    async fn handle_cmd(&self, cmd: Cmd, scheduler: &mut SerialScheduler) {
        match cmd {
            Cmd::Load { zone, tx } => {
                let res = self.load_zone(*zone, scheduler).await;
                if tx.send(res).is_err() {
                    debug!("load caller went away before the reply");
                }
            }
            Cmd::Reload { zone, tx } => {
                self.reload_zone(*zone, scheduler).await;
                if tx.send(()).is_err() {
                    debug!("reload caller went away before the reply");
                }
            }
            Cmd::Delete { name, tx } => {
                let res = self.delete_zone(&name, scheduler);
                if tx.send(res).is_err() {
                    debug!("delete caller went away before the reply");
                }
            }
            Cmd::MemoryReport { tx } => {
                let report = self.build_memory_report(scheduler);
                if tx.send(report).is_err() {
                    debug!("memory report caller went away");
                }
            }
        }
    }

    async fn load_zone(
        &self,
        zone: ZoneRecord,
        scheduler: &mut SerialScheduler,
    ) -> Result<(), ZoneUpdateError> {
        let name = zone.name().clone();
        if self.catalog.is_loaded(&name) {
            return Err(ZoneUpdateError::AlreadyLoaded);
        }
        let serials: Vec<u64> = zone.serials().iter().copied().collect();
        self.catalog.store(zone);
        self.index.insert(&name);
        scheduler.schedule(&name, serials);
        debug!(zone = %name, "loaded zone");
        self.notify(name, ZoneChangedCause::Loaded).await;
        Ok(())
    }

    async fn reload_zone(
        &self,
        zone: ZoneRecord,
        scheduler: &mut SerialScheduler,
    ) {
        let name = zone.name().clone();
        let was_loaded = self.catalog.is_loaded(&name);
        let serials: Vec<u64> = zone.serials().iter().copied().collect();
        self.catalog.store(zone);
        if !was_loaded {
            // Re-inserting a present zone would double count its own
            // ancestor nodes.
            self.index.insert(&name);
        }
        scheduler.schedule(&name, serials);
        debug!(zone = %name, "reloaded zone");
        self.notify(name, ZoneChangedCause::Reloaded).await;
    }

    fn delete_zone(
        &self,
        name: &ZoneName,
        scheduler: &mut SerialScheduler,
    ) -> Result<(), ZoneUpdateError> {
        if !self.catalog.is_loaded(name) {
            return Err(ZoneUpdateError::NotLoaded);
        }
        self.index.remove(name);
        self.catalog.delete(name);
        scheduler.cancel(name);
        debug!(zone = %name, "deleted zone");
        Ok(())
    }

    async fn handle_fired(
        &self,
        fired: SerialFired,
        scheduler: &mut SerialScheduler,
    ) {
        let Some(remaining) = scheduler.confirm(&fired) else {
            trace!(zone = %fired.zone, "serial fired for gone zone, dropped");
            return;
        };
        debug!(zone = %fired.zone, "scheduled serial reached");
        self.notify(fired.zone.clone(), ZoneChangedCause::SerialElapsed)
            .await;
        scheduler.schedule(&fired.zone, remaining);
    }

    async fn notify(&self, name: ZoneName, cause: ZoneChangedCause) {
        let msg = ZoneChanged { name, cause };
        if self.changed_tx.send(msg).await.is_err() {
            debug!("zone change subscriber has gone away");
        }
    }

    fn build_memory_report(
        &self,
        scheduler: &SerialScheduler,
    ) -> MemoryReport {
        let index_bytes = self.index.mem_usage();
        let catalog_bytes = self.catalog.mem_usage();
        let scheduler_bytes = scheduler.mem_usage();
        MemoryReport {
            index_bytes,
            catalog_bytes,
            scheduler_bytes,
            total_bytes: index_bytes + catalog_bytes + scheduler_bytes,
        }
    }
}

//============ Tests =========================================================
