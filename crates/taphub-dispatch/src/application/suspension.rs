//! Suspension tokens.
//!
//! A suspension forces the pipeline inactive while held, regardless of every
//! other prerequisite. Suspensions compose by set union: unrelated callers
//! acquire and release independently, and the pipeline is suspended exactly
//! while the active set is non-empty.

use std::collections::HashSet;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, Weak,
};

use taphub_core::SuspensionId;
use tracing::debug;

use super::dispatch::DispatchShared;

/// The set of currently active suspensions.
#[derive(Default)]
pub(crate) struct SuspensionSet {
    active: Mutex<HashSet<SuspensionId>>,
}

impl SuspensionSet {
    /// Inserts a fresh suspension and returns its id.
    pub(crate) fn insert(&self) -> SuspensionId {
        let id = SuspensionId::fresh();
        self.active.lock().expect("lock poisoned").insert(id);
        id
    }

    /// Removes by id. Returns `false` when the id was already gone, so a
    /// repeated release never double-affects prerequisite state.
    pub(crate) fn remove(&self, id: SuspensionId) -> bool {
        self.active.lock().expect("lock poisoned").remove(&id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.active.lock().expect("lock poisoned").is_empty()
    }
}

/// Capability to release one acquired suspension.
///
/// Release fires exactly once, whether through [`release`](Self::release) or
/// by dropping the guard; repeated calls are no-ops.
pub struct SuspensionGuard {
    id: SuspensionId,
    shared: Weak<DispatchShared>,
    released: AtomicBool,
}

impl SuspensionGuard {
    pub(crate) fn new(id: SuspensionId, shared: Weak<DispatchShared>) -> Self {
        Self {
            id,
            shared,
            released: AtomicBool::new(false),
        }
    }

    /// Identity of the suspension this guard holds.
    pub fn id(&self) -> SuspensionId {
        self.id
    }

    /// Releases the suspension. Idempotent.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            debug!(suspension = %self.id, "releasing suspension");
            shared.release_suspension(self.id);
        }
    }
}

impl Drop for SuspensionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
