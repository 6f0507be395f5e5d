//! Pinning of script values
//!
//! Script values are only valid for the duration of one locked session. A
//! value the host keeps beyond that is pinned: rooted in the context's pin
//! table under a host-allocated id, so neither reference counting nor the
//! collector can free it. Each pin is released exactly once, when the last
//! handle to it drops.
//!
//! Handles can be dropped on any thread, including one that already holds the
//! context lock (a host closure discarded during teardown, a conversion that
//! fails after pinning). Releases therefore go through a queue that is drained
//! under the lock by the next entry point.

use std::fmt;
use std::sync::{Mutex, PoisonError, Weak};

/// Identifier of a pinned script value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinId(pub(crate) u64);

impl PinId {
    /// Raw id, used as the key in the engine-side pin table
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

/// Host-side id allocation for one context
#[derive(Debug, Default)]
pub(crate) struct PinAllocator {
    next: u64,
    live: usize,
}

impl PinAllocator {
    pub(crate) fn allocate(&mut self) -> PinId {
        // Ids are never reused.
        self.next += 1;
        self.live += 1;
        PinId(self.next)
    }

    pub(crate) fn released(&mut self, count: usize) {
        self.live = self.live.saturating_sub(count);
    }

    /// Number of pins not yet released
    pub(crate) fn live(&self) -> usize {
        self.live
    }
}

/// Something that can unpin values: the shared state of a context
pub(crate) trait PinOwner: Send + Sync {
    fn release(&self, id: PinId);
}

/// Unpins waiting for the context lock
#[derive(Debug, Default)]
pub(crate) struct ReleaseQueue {
    pending: Mutex<Vec<PinId>>,
}

impl ReleaseQueue {
    pub(crate) fn push(&self, id: PinId) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }

    pub(crate) fn take(&self) -> Vec<PinId> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Owner side of one pin. Dropping it releases the pin.
pub(crate) struct PinHandle {
    owner: Weak<dyn PinOwner>,
    context: u64,
    id: PinId,
}

impl PinHandle {
    pub(crate) fn new(owner: Weak<dyn PinOwner>, context: u64, id: PinId) -> Self {
        PinHandle { owner, context, id }
    }

    pub(crate) fn id(&self) -> PinId {
        self.id
    }

    /// Id of the context the pinned value lives in
    pub(crate) fn context(&self) -> u64 {
        self.context
    }

    /// Whether the owning context still exists
    pub(crate) fn is_attached(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl Drop for PinHandle {
    fn drop(&mut self) {
        // A destroyed context took its pin table with it.
        if let Some(owner) = self.owner.upgrade() {
            owner.release(self.id);
        }
    }
}

impl fmt::Debug for PinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinHandle")
            .field("context", &self.context)
            .field("id", &self.id)
            .finish()
    }
}
