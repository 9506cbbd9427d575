//! Receiver registry.
//!
//! The registry is the dispatcher's owned collection of attached receivers.
//! Each receiver is a record with a priority, an enabled flag, and a
//! processing mode; identity is a fresh [`ReceiverId`] per attach, and
//! removal is always by id.
//!
//! # Concurrency
//!
//! Attach and detach replace the whole collection atomically under one lock,
//! so a reader always observes a complete before/after state, never a
//! partial mutation. Readers take the current `Arc` of the map and iterate
//! it lock-free: the hot dispatch path snapshots once per event and is
//! never invalidated by concurrent mutation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, Weak,
};

use async_trait::async_trait;
use taphub_core::{Instruction, RawEvent, ReceiverId};
use tracing::debug;

use super::dispatch::DispatchShared;

/// Default receiver priority: the maximum representable value, i.e. the
/// receiver runs before anything with an explicitly lowered priority.
pub const DEFAULT_PRIORITY: u64 = u64::MAX;

/// Synchronous receiver logic, invoked inline on the delivery thread.
pub type SyncReceiverFn = Box<dyn Fn(RawEvent) -> Instruction + Send + Sync>;

/// Asynchronous receiver logic: produces a future the dispatcher runs as an
/// independent task while the delivery thread waits for the verdict.
pub type AsyncReceiverFn =
    Box<dyn Fn(RawEvent) -> Pin<Box<dyn Future<Output = Instruction> + Send>> + Send + Sync>;

/// Object-implemented receiver interface.
///
/// Implementations run as independent tasks; the delivery thread blocks until
/// [`handle_event`](Self::handle_event) resolves, so implementations must not
/// await long-running work or the OS will revoke the tap.
#[async_trait]
pub trait RawEventHandler: Send + Sync {
    /// Handles one event copy and returns the dispatch verdict.
    async fn handle_event(&self, event: RawEvent) -> Instruction;
}

/// Processing mode of an attached receiver.
pub(crate) enum Processor {
    Sync(SyncReceiverFn),
    Async(AsyncReceiverFn),
    Handler(Arc<dyn RawEventHandler>),
}

/// One attached receiver.
///
/// `priority` and `enabled` are atomics so any holder of the handle may
/// change them concurrently with in-flight dispatch.
pub(crate) struct ReceiverRecord {
    id: ReceiverId,
    priority: AtomicU64,
    enabled: AtomicBool,
    processor: Processor,
}

impl ReceiverRecord {
    pub(crate) fn new(processor: Processor) -> Self {
        Self {
            id: ReceiverId::fresh(),
            priority: AtomicU64::new(DEFAULT_PRIORITY),
            enabled: AtomicBool::new(true),
            processor,
        }
    }

    pub(crate) fn id(&self) -> ReceiverId {
        self.id
    }

    pub(crate) fn priority(&self) -> u64 {
        self.priority.load(Ordering::SeqCst)
    }

    pub(crate) fn set_priority(&self, priority: u64) {
        self.priority.store(priority, Ordering::SeqCst);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub(crate) fn processor(&self) -> &Processor {
        &self.processor
    }
}

/// The owned collection of attached receivers.
#[derive(Default)]
pub(crate) struct ReceiverRegistry {
    receivers: Mutex<Arc<HashMap<ReceiverId, Arc<ReceiverRecord>>>>,
}

impl ReceiverRegistry {
    /// Attaches a record. Constant-amortized; replaces the collection as a
    /// whole under the lock.
    pub(crate) fn attach(&self, record: Arc<ReceiverRecord>) {
        let mut guard = self.receivers.lock().expect("lock poisoned");
        let mut next: HashMap<_, _> = (**guard).clone();
        next.insert(record.id(), record);
        *guard = Arc::new(next);
    }

    /// Detaches by id. Returns `false` (no-op) when the id is absent, which
    /// makes repeated detach idempotent.
    pub(crate) fn detach(&self, id: ReceiverId) -> bool {
        let mut guard = self.receivers.lock().expect("lock poisoned");
        if !guard.contains_key(&id) {
            return false;
        }
        let mut next: HashMap<_, _> = (**guard).clone();
        next.remove(&id);
        *guard = Arc::new(next);
        true
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receivers.lock().expect("lock poisoned").is_empty()
    }

    /// Defensive copy of every attached record.
    pub(crate) fn snapshot(&self) -> Vec<Arc<ReceiverRecord>> {
        let map = Arc::clone(&*self.receivers.lock().expect("lock poisoned"));
        map.values().cloned().collect()
    }

    /// Enabled records, sorted ascending by priority. Dispatch iterates this
    /// from the end: highest priority first.
    pub(crate) fn active_snapshot(&self) -> Vec<Arc<ReceiverRecord>> {
        let map = Arc::clone(&*self.receivers.lock().expect("lock poisoned"));
        let mut active: Vec<_> = map.values().filter(|r| r.is_enabled()).cloned().collect();
        active.sort_by_key(|r| r.priority());
        active
    }
}

/// Capability to mutate and detach one attached receiver.
///
/// Detachment fires exactly once, whether through [`detach`](Self::detach) or
/// by dropping the handle; repeated calls are no-ops. A stream's backing
/// receiver is detached the same way when the stream is dropped.
pub struct ReceiverHandle {
    id: ReceiverId,
    record: Arc<ReceiverRecord>,
    shared: Weak<DispatchShared>,
    detached: AtomicBool,
}

impl ReceiverHandle {
    pub(crate) fn new(record: Arc<ReceiverRecord>, shared: Weak<DispatchShared>) -> Self {
        Self {
            id: record.id(),
            record,
            shared,
            detached: AtomicBool::new(false),
        }
    }

    /// Identity of the attached receiver.
    pub fn id(&self) -> ReceiverId {
        self.id
    }

    /// Changes the receiver's priority. Takes effect on the next dispatched
    /// event.
    pub fn set_priority(&self, priority: u64) {
        self.record.set_priority(priority);
    }

    /// Enables or disables the receiver without detaching it.
    pub fn set_enabled(&self, enabled: bool) {
        self.record.set_enabled(enabled);
    }

    /// Detaches the receiver from its dispatcher. Idempotent.
    pub fn detach(&self) {
        // Single-fire: the first caller (or the drop) wins.
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            debug!(receiver = %self.id, "detaching receiver");
            shared.detach_receiver(self.id);
        }
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
