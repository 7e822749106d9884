//! Scheduling of serial-driven zone changes.
//!
//! Each loaded zone may carry a set of future timestamps at which its
//! state is scheduled to change. The scheduler keeps exactly one armed
//! timer per zone, targeting the nearest of those timestamps, and re-arms
//! for the next one after a fire. Timer futures live in a
//! [`FuturesUnordered`] polled from the zone manager's select loop.
//!
//! Cancellation is best-effort: removing a zone's watch entry does not
//! tear the timer future out of the set, it merely guarantees that the
//! eventual fire is discarded by the generation check in [`confirm`].
//!
//! [`confirm`]: SerialScheduler::confirm

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::mem;
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, trace};

use crate::name::ZoneName;

//------------ Constants -----------------------------------------------------

/// The longest delay for which a timer will be armed.
///
/// This is the widest delay a 32-bit millisecond timer can represent.
/// Serials further out are treated as effectively-permanent markers, e.g.
/// a deliberately distant key expiry date, and never arm a timer.
pub const TIMER_HORIZON: Duration = Duration::from_millis(u32::MAX as u64);

/// The current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

//------------ SerialFired ---------------------------------------------------

/// An elapsed timer, as yielded by [`SerialScheduler::next_fired`].
#[derive(Clone, Debug)]
pub(crate) struct SerialFired {
    pub zone: ZoneName,
    pub generation: u64,
}

//------------ SerialTimer ---------------------------------------------------

/// The single armed timer of one zone.
///
/// Completes with a [`SerialFired`] carrying the generation it was armed
/// with, so that a fire can be matched against the watch state that is
/// current by the time it is handled.
struct SerialTimer {
    zone: ZoneName,
    generation: u64,
    sleep_fut: Pin<Box<Sleep>>,
}

impl SerialTimer {
    fn new(zone: ZoneName, generation: u64, delay: Duration) -> Self {
        SerialTimer {
            zone,
            generation,
            sleep_fut: Box::pin(sleep(delay)),
        }
    }

    /// Re-arms the timer in place for a new deadline and generation.
    fn reset(&mut self, generation: u64, delay: Duration) {
        self.generation = generation;
        self.sleep_fut.as_mut().reset(Instant::now() + delay);
    }
}

impl Future for SerialTimer {
    type Output = SerialFired;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        match self.sleep_fut.poll_unpin(cx) {
            Poll::Ready(()) => Poll::Ready(SerialFired {
                zone: self.zone.clone(),
                generation: self.generation,
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

//------------ SerialWatch ---------------------------------------------------

/// The stored schedule of one zone.
///
/// Present iff a timer is armed for the zone; the armed timer targets the
/// first entry of `pending`.
#[derive(Clone, Debug)]
struct SerialWatch {
    generation: u64,

    /// The zone's future serials not yet fired, ascending.
    pending: Vec<u64>,
}

//------------ SerialScheduler -----------------------------------------------

/// Per-zone timers for scheduled zone changes.
///
/// Owned by the zone manager's run task; all methods are called from that
/// single task.
pub(crate) struct SerialScheduler {
    watches: HashMap<ZoneName, SerialWatch>,
    timers: FuturesUnordered<SerialTimer>,
    generation: u64,
}

impl SerialScheduler {
    pub fn new() -> Self {
        SerialScheduler {
            watches: HashMap::new(),
            timers: FuturesUnordered::new(),
            generation: 0,
        }
    }

    /// Replaces a zone's schedule with the given serials.
    ///
    /// Any previous watch for the zone is dropped first. Only serials
    /// strictly in the future count; if the nearest of them is within
    /// [`TIMER_HORIZON`] a timer is armed for it, otherwise the zone is
    /// left without a watch entry.
    pub fn schedule(
        &mut self,
        zone: &ZoneName,
        serials: impl IntoIterator<Item = u64>,
    ) {
        self.watches.remove(zone);

        let now = unix_now();
        let mut pending: Vec<u64> =
            serials.into_iter().filter(|&serial| serial > now).collect();
        pending.sort_unstable();
        pending.dedup();

        let Some(&nearest) = pending.first() else {
            trace!(zone = %zone, "no future serials, nothing to arm");
            return;
        };
        let delay = Duration::from_secs(nearest - now);
        if delay > TIMER_HORIZON {
            debug!(
                zone = %zone, serial = nearest,
                "nearest serial beyond timer horizon, not arming"
            );
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        match self
            .timers
            .iter_mut()
            .find(|timer| timer.zone == *zone)
        {
            Some(timer) => timer.reset(generation, delay),
            None => self.timers.push(SerialTimer::new(
                zone.clone(),
                generation,
                delay,
            )),
        }
        self.watches.insert(
            zone.clone(),
            SerialWatch {
                generation,
                pending,
            },
        );
        trace!(zone = %zone, serial = nearest, "armed serial timer");
    }

    /// Drops a zone's watch entry.
    ///
    /// An already-armed timer future is left to elapse; its fire will not
    /// pass [`confirm`] anymore.
    ///
    /// [`confirm`]: Self::confirm
    pub fn cancel(&mut self, zone: &ZoneName) {
        if self.watches.remove(zone).is_some() {
            trace!(zone = %zone, "cancelled serial watch");
        }
    }

    /// Matches a fired timer against the current watch state.
    ///
    /// Returns the serials still pending for the zone, fired one removed,
    /// when the fire is current. A stale fire, i.e. the zone was deleted
    /// or rescheduled after the timer was armed, returns `None`.
    pub fn confirm(&mut self, fired: &SerialFired) -> Option<Vec<u64>> {
        match self.watches.entry(fired.zone.clone()) {
            Entry::Occupied(entry)
                if entry.get().generation == fired.generation =>
            {
                let mut pending = entry.remove().pending;
                if !pending.is_empty() {
                    pending.remove(0);
                }
                Some(pending)
            }
            _ => {
                trace!(zone = %fired.zone, "ignoring stale serial timer");
                None
            }
        }
    }

    /// Waits for the next timer to elapse.
    ///
    /// Resolves to `None` while no timer is armed; intended for use as a
    /// `Some(..)`-patterned select branch.
    pub async fn next_fired(&mut self) -> Option<SerialFired> {
        self.timers.next().await
    }

    /// The serial the zone's armed timer currently targets, if any.
    pub fn armed_target(&self, zone: &ZoneName) -> Option<u64> {
        self.watches.get(zone).and_then(|watch| {
            watch.pending.first().copied()
        })
    }

    /// The number of zones with an armed timer.
    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// The number of timer futures, including stale ones not yet elapsed.
    #[cfg(test)]
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// Approximate heap usage of watches and timer futures in bytes.
    pub fn mem_usage(&self) -> usize {
        let watches = self
            .watches
            .iter()
            .map(|(zone, watch)| {
                zone.mem_usage()
                    + mem::size_of::<SerialWatch>()
                    + watch.pending.len() * mem::size_of::<u64>()
            })
            .sum::<usize>();
        let timers = self.timers.len()
            * (mem::size_of::<SerialTimer>() + mem::size_of::<Sleep>());
        watches + timers
    }
}

//============ Tests =========================================================
