//! Shared reconciler state
//!
//! The one piece of explicit shared state between the bulk reconciler and
//! the incremental event processor: who currently owns the target. A bulk
//! pass needs exclusive ownership; event batches share ownership among
//! themselves. Both modes hold a reference to the same `ReconcilerState`;
//! there is no global.

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

const BULK: isize = -1;

/// Shared state visible to both bulk and incremental reconciliation.
///
/// Ownership is a single atomic: `0` idle, `-1` a bulk pass, `n > 0` the
/// number of event batches in flight. Acquisition in either mode is a
/// compare-exchange on that value, so a check never races with an
/// acquisition in the other mode.
#[derive(Debug, Default)]
pub struct ReconcilerState {
    occupancy: AtomicIsize,
}

impl ReconcilerState {
    /// Create fresh state with nothing running.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether a bulk pass currently holds exclusive ownership.
    pub fn is_bulk_running(&self) -> bool {
        self.occupancy.load(Ordering::SeqCst) == BULK
    }

    /// Try to claim exclusive ownership for a bulk pass.
    ///
    /// Returns a guard that releases on drop, or `None` while another bulk
    /// pass or any event batch holds the state. The compare-exchange makes
    /// the check-then-set atomic, so a bulk pass can never start while a
    /// batch is mid-flight.
    pub fn try_begin_bulk(self: &Arc<Self>) -> Option<BulkGuard> {
        self.occupancy
            .compare_exchange(0, BULK, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BulkGuard {
                state: Arc::clone(self),
            })
    }

    /// Try to claim shared ownership for an event batch.
    ///
    /// Returns a guard that releases on drop, or `None` while a bulk pass
    /// holds the state. Batches stack: each holds its own guard for the
    /// duration of the batch, and a bulk pass is refused until the last
    /// one drops.
    pub fn try_begin_batch(self: &Arc<Self>) -> Option<BatchGuard> {
        self.occupancy
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |occupancy| {
                if occupancy == BULK {
                    None
                } else {
                    Some(occupancy + 1)
                }
            })
            .ok()
            .map(|_| BatchGuard {
                state: Arc::clone(self),
            })
    }
}

/// RAII guard for a bulk pass's exclusive ownership.
#[derive(Debug)]
pub struct BulkGuard {
    state: Arc<ReconcilerState>,
}

impl Drop for BulkGuard {
    fn drop(&mut self) {
        self.state.occupancy.store(0, Ordering::SeqCst);
    }
}

/// RAII guard for one event batch's shared ownership.
#[derive(Debug)]
pub struct BatchGuard {
    state: Arc<ReconcilerState>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.state.occupancy.fetch_sub(1, Ordering::SeqCst);
    }
}
