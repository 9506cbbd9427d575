//! The dispatcher.
//!
//! This is the root of the dispatch layer. It owns the receiver registry,
//! the cached prerequisite state, the suspension set, and a swappable event
//! source reference; it implements the priority-ordered dispatch algorithm
//! and keeps the source's enablement reconciled with the aggregate
//! prerequisite state.
//!
//! # Threading
//!
//! Raw events arrive synchronously on a thread the OS owns, with a hard time
//! budget. Administrative mutation (attach/detach, suspension, manual
//! enable, source swap) may happen concurrently from any thread, and
//! prerequisite changes arrive on a background task. There is no global
//! lock: each independently mutable piece of state has its own critical
//! section, entered only for a read-modify-write and never held across a
//! call into another component. The one place the delivery thread blocks is
//! the bridge that joins an asynchronous receiver's verdict.

use std::future::Future;
use std::pin::Pin;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, Weak,
};
use std::time::Instant;

use taphub_core::{Instruction, Prereq, PrereqChange, PrereqSet, RawEvent, ReceiverId, SuspensionId};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::infrastructure::config::DispatchOptions;
use crate::infrastructure::event_source::{EventDelegate, EventSource};
use crate::infrastructure::prereq_feed::PrereqFeed;

use super::prereq_tracker::PrereqTracker;
use super::registry::{
    Processor, RawEventHandler, ReceiverHandle, ReceiverRecord, ReceiverRegistry,
};
use super::stats::{DispatchStats, StatsSnapshot};
use super::stream::EventStream;
use super::suspension::{SuspensionGuard, SuspensionSet};

/// State shared between the dispatcher, its handles, its delegate, and its
/// background tasks.
pub(crate) struct DispatchShared {
    registry: ReceiverRegistry,
    prereqs: PrereqTracker,
    suspensions: SuspensionSet,
    /// Manual enable override. Lock-free: read on every reconciliation,
    /// written rarely.
    enabled: AtomicBool,
    source: Mutex<Option<Arc<dyn EventSource>>>,
    stats: DispatchStats,
    runtime: Handle,
    self_heal: bool,
    slow_receiver_warn_ms: u64,
}

impl DispatchShared {
    /// Aggregate prerequisite set: the cached external flags plus the three
    /// conditions derived from dispatcher state.
    pub(crate) fn current_prereqs(&self) -> PrereqSet {
        let mut set = self.prereqs.external();
        if self.enabled.load(Ordering::SeqCst) {
            set.insert(Prereq::Enabled);
        }
        if !self.registry.is_empty() {
            set.insert(Prereq::HasReceivers);
        }
        if self.suspensions.is_empty() {
            set.insert(Prereq::NoSuspensions);
        }
        set
    }

    fn is_satisfied(&self) -> bool {
        self.current_prereqs().is_all()
    }

    /// Brings the event source's enablement in line with the prerequisites.
    ///
    /// Idempotent and safe to call redundantly: the enable/disable
    /// transition is only performed on an observed state change, and the
    /// decision is always recomputed from current state, so concurrent
    /// callers cost at most one redundant toggle.
    pub(crate) fn reconcile(&self) {
        let desired = self.is_satisfied();
        // Clone the source out of the slot; the lock is released before the
        // source is called.
        let source = self.source.lock().expect("lock poisoned").clone();
        let Some(source) = source else {
            return;
        };
        if source.is_enabled() != desired {
            debug!(desired, prereqs = ?self.current_prereqs(), "reconciling event source");
            if let Err(err) = source.set_enabled(desired) {
                warn!(%err, desired, "event source refused enable transition");
            }
        }
    }

    pub(crate) fn detach_receiver(&self, id: ReceiverId) {
        if self.registry.detach(id) {
            self.reconcile();
        }
    }

    pub(crate) fn release_suspension(&self, id: SuspensionId) {
        if self.suspensions.remove(id) {
            self.reconcile();
        }
    }

    fn apply_prereq_change(&self, change: PrereqChange) {
        if self.prereqs.apply(change) {
            self.reconcile();
        }
    }

    /// Self-heal cycle after an OS-forced revocation: disable the source,
    /// then reconcile (which re-enables it if the prerequisites still hold).
    fn restart_source(&self) {
        let source = self.source.lock().expect("lock poisoned").clone();
        if let Some(source) = source {
            if let Err(err) = source.set_enabled(false) {
                warn!(%err, "failed to disable event source during restart");
            }
        }
        self.reconcile();
    }

    /// Dispatches one raw event through the receiver pipeline.
    ///
    /// Runs on the source's delivery thread. Returns `None` when the event
    /// was consumed, or the event to forward unmodified.
    pub(crate) fn dispatch(self: &Arc<Self>, event: RawEvent) -> Option<RawEvent> {
        self.stats.record_delivered();

        if event.kind().is_revocation() {
            // Never restart inline: the delivery thread must return within
            // its budget, and enabling stands up OS resources.
            if self.self_heal {
                warn!(kind = ?event.kind(), "event source revoked by the OS; scheduling restart");
                self.stats.record_self_heal();
                let shared = Arc::clone(self);
                self.runtime.spawn(async move {
                    shared.restart_source();
                });
            } else {
                warn!(kind = ?event.kind(), "event source revoked by the OS; self-heal disabled");
            }
            self.stats.record_consumed();
            return None;
        }

        // Snapshot is sorted ascending by priority; highest priority first.
        let receivers = self.registry.active_snapshot();
        for record in receivers.iter().rev() {
            let copy = match event.duplicate() {
                Ok(copy) => copy,
                Err(err) => {
                    // Recoverable per-event: skip this receiver only.
                    self.stats.record_copy_failure();
                    warn!(receiver = %record.id(), %err, "event copy failed; skipping receiver");
                    continue;
                }
            };
            match self.run_processor(record, copy) {
                Instruction::Retain => {
                    self.stats.record_consumed();
                    return None;
                }
                Instruction::Bypass => {
                    self.stats.record_bypassed();
                    return Some(event);
                }
                Instruction::Pass => {}
            }
        }
        Some(event)
    }

    fn run_processor(&self, record: &ReceiverRecord, event: RawEvent) -> Instruction {
        let started = Instant::now();
        let instruction = match record.processor() {
            Processor::Sync(f) => f(event),
            Processor::Async(f) => self.join_receiver_task(f(event)),
            Processor::Handler(handler) => {
                let handler = Arc::clone(handler);
                self.join_receiver_task(Box::pin(async move { handler.handle_event(event).await }))
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if elapsed_ms > self.slow_receiver_warn_ms {
            warn!(
                receiver = %record.id(),
                elapsed_ms,
                "receiver exceeded the delivery time budget"
            );
        }
        instruction
    }

    /// Bridges an asynchronous receiver to the synchronous delivery thread:
    /// the future runs as an independent task while this thread waits on a
    /// one-shot signal for its verdict. This is the single sanctioned
    /// suspension point on the hot path.
    fn join_receiver_task(
        &self,
        future: Pin<Box<dyn Future<Output = Instruction> + Send>>,
    ) -> Instruction {
        let (tx, rx) = oneshot::channel();
        self.runtime.spawn(async move {
            let _ = tx.send(future.await);
        });
        match rx.blocking_recv() {
            Ok(instruction) => instruction,
            Err(_) => {
                // The task died without a verdict (receiver panicked).
                error!("async receiver task dropped without a verdict");
                Instruction::Pass
            }
        }
    }
}

/// Adapter through which an event source delivers into the dispatcher.
///
/// Holds the shared state weakly so a source outliving its dispatcher
/// degrades to forwarding everything untouched.
struct DispatchDelegate {
    shared: Weak<DispatchShared>,
}

impl EventDelegate for DispatchDelegate {
    fn deliver(&self, event: RawEvent) -> Option<RawEvent> {
        match self.shared.upgrade() {
            Some(shared) => shared.dispatch(event),
            None => Some(event),
        }
    }
}

/// The thread-safe HID event dispatcher.
///
/// See the [module docs](self) for the threading model. All methods take
/// `&self` and may be called from any thread.
pub struct Dispatcher {
    shared: Arc<DispatchShared>,
    delegate: Arc<DispatchDelegate>,
    /// Background consumption of the prerequisite change stream; aborted at
    /// teardown.
    pump: JoinHandle<()>,
}

impl Dispatcher {
    /// Creates a dispatcher with default [`DispatchOptions`].
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; the dispatcher spawns its
    /// background tasks on the ambient runtime.
    pub fn new(feed: PrereqFeed) -> Self {
        Self::with_options(feed, DispatchOptions::default())
    }

    /// Creates a dispatcher with explicit options.
    ///
    /// The accessibility probe is queried exactly once, here; afterwards the
    /// permission is tracked solely through the change stream.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn with_options(feed: PrereqFeed, options: DispatchOptions) -> Self {
        let PrereqFeed {
            changes,
            accessibility_probe,
        } = feed;
        let accessibility_granted = (accessibility_probe)();

        let shared = Arc::new(DispatchShared {
            registry: ReceiverRegistry::default(),
            prereqs: PrereqTracker::new(accessibility_granted),
            suspensions: SuspensionSet::default(),
            enabled: AtomicBool::new(options.enabled_at_start),
            source: Mutex::new(None),
            stats: DispatchStats::default(),
            runtime: Handle::current(),
            self_heal: options.self_heal,
            slow_receiver_warn_ms: options.slow_receiver_warn_ms,
        });

        let pump = shared
            .runtime
            .spawn(Self::pump(Arc::downgrade(&shared), changes));
        let delegate = Arc::new(DispatchDelegate {
            shared: Arc::downgrade(&shared),
        });

        Self {
            shared,
            delegate,
            pump,
        }
    }

    /// Background task consuming the prerequisite change stream for the
    /// dispatcher's lifetime.
    async fn pump(
        shared: Weak<DispatchShared>,
        mut changes: mpsc::UnboundedReceiver<PrereqChange>,
    ) {
        while let Some(change) = changes.recv().await {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            shared.apply_prereq_change(change);
        }
        debug!("prerequisite change stream ended");
    }

    fn attach(&self, processor: Processor) -> ReceiverHandle {
        let record = Arc::new(ReceiverRecord::new(processor));
        debug!(receiver = %record.id(), "attaching receiver");
        let handle = ReceiverHandle::new(Arc::clone(&record), Arc::downgrade(&self.shared));
        self.shared.registry.attach(record);
        self.shared.reconcile();
        handle
    }

    /// Attaches a synchronous receiver. The closure runs inline on the
    /// delivery thread and must return within the OS time budget.
    pub fn add_receiver<F>(&self, f: F) -> ReceiverHandle
    where
        F: Fn(RawEvent) -> Instruction + Send + Sync + 'static,
    {
        self.attach(Processor::Sync(Box::new(f)))
    }

    /// Attaches an asynchronous receiver. Each event runs the returned
    /// future as an independent task; the delivery thread waits for its
    /// verdict.
    pub fn add_receiver_async<F, Fut>(&self, f: F) -> ReceiverHandle
    where
        F: Fn(RawEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Instruction> + Send + 'static,
    {
        self.attach(Processor::Async(Box::new(move |event| {
            Box::pin(f(event)) as Pin<Box<dyn Future<Output = Instruction> + Send>>
        })))
    }

    /// Attaches an object-implemented receiver.
    pub fn add_handler(&self, handler: Arc<dyn RawEventHandler>) -> ReceiverHandle {
        self.attach(Processor::Handler(handler))
    }

    /// Attaches an observer: a closure that sees every event and always
    /// yields [`Instruction::Pass`].
    pub fn add_observer<F>(&self, f: F) -> ReceiverHandle
    where
        F: Fn(RawEvent) + Send + Sync + 'static,
    {
        self.add_observer_with(Instruction::default(), f)
    }

    /// Attaches an observer with a fixed instruction returned for every
    /// event.
    pub fn add_observer_with<F>(&self, instruction: Instruction, f: F) -> ReceiverHandle
    where
        F: Fn(RawEvent) + Send + Sync + 'static,
    {
        self.attach(Processor::Sync(Box::new(move |event| {
            f(event);
            instruction
        })))
    }

    /// Exposes dispatched events as a cancellable sequence at the given
    /// priority. Dropping the stream detaches the backing receiver.
    pub fn stream(&self, priority: u64) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.add_receiver(move |event| {
            // The consumer may already be gone; a failed send is not an error.
            let _ = tx.send(event);
            Instruction::Pass
        });
        handle.set_priority(priority);
        EventStream::new(rx, handle)
    }

    /// Sets the manual enable override.
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
        self.shared.reconcile();
    }

    /// Current manual enable override.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// `true` while at least one suspension is held.
    pub fn is_suspended(&self) -> bool {
        !self.shared.suspensions.is_empty()
    }

    /// Acquires a suspension that forces the pipeline inactive while held.
    /// Independently acquired suspensions compose; the pipeline resumes once
    /// every guard is released.
    pub fn acquire_suspension(&self) -> SuspensionGuard {
        let id = self.shared.suspensions.insert();
        debug!(suspension = %id, "suspension acquired");
        self.shared.reconcile();
        SuspensionGuard::new(id, Arc::downgrade(&self.shared))
    }

    /// Read-only view of the aggregate prerequisite set.
    pub fn prerequisites(&self) -> PrereqSet {
        self.shared.current_prereqs()
    }

    /// Associates (or clears) the event source. The previous source, if any,
    /// is disabled; the new one is reconciled against current prerequisites.
    pub fn set_event_source(&self, source: Option<Arc<dyn EventSource>>) {
        let previous = {
            let mut slot = self.shared.source.lock().expect("lock poisoned");
            std::mem::replace(&mut *slot, source)
        };
        if let Some(previous) = previous {
            if previous.is_enabled() {
                if let Err(err) = previous.set_enabled(false) {
                    warn!(%err, "failed to disable replaced event source");
                }
            }
        }
        self.shared.reconcile();
    }

    /// The delegate to hand to an event source at construction.
    pub fn delegate(&self) -> Arc<dyn EventDelegate> {
        Arc::clone(&self.delegate) as Arc<dyn EventDelegate>
    }

    /// Point-in-time dispatch counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.pump.abort();
        // Leave no live tap behind.
        let source = self.shared.source.lock().expect("lock poisoned").take();
        if let Some(source) = source {
            if source.is_enabled() {
                if let Err(err) = source.set_enabled(false) {
                    warn!(%err, "failed to disable event source at teardown");
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
