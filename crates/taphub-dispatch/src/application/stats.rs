//! Dispatch counters.
//!
//! Lock-free counters updated on the hot delivery path and read for
//! diagnostics. `Ordering::Relaxed` is sufficient: the counters only count,
//! they never synchronize memory between threads.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one dispatcher.
#[derive(Default)]
pub(crate) struct DispatchStats {
    delivered: AtomicU64,
    consumed: AtomicU64,
    bypassed: AtomicU64,
    copy_failures: AtomicU64,
    self_heals: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumed(&self) {
        self.consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypassed(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_copy_failure(&self) {
        self.copy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_self_heal(&self) {
        self.self_heals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            copy_failures: self.copy_failures.load(Ordering::Relaxed),
            self_heals: self.self_heals.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the dispatch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Events delivered by the source, including revocation signals.
    pub delivered: u64,
    /// Events consumed (`Retain` or a self-healed revocation signal).
    pub consumed: u64,
    /// Events forwarded early via `Bypass`.
    pub bypassed: u64,
    /// Per-receiver event copies the OS refused.
    pub copy_failures: u64,
    /// Disable/re-enable cycles triggered by OS revocation.
    pub self_heals: u64,
}
