//! Event source infrastructure.
//!
//! An event source is the OS-level interception point that observes raw HID
//! events and can suppress them before they reach other applications. The
//! dispatcher never talks to the OS directly; it holds a source behind the
//! [`EventSource`] trait and receives events through the [`EventDelegate`]
//! callback, so production code and tests plug in different implementations:
//!
//! - [`run_loop::RunLoopEventSource`] hosts a real interception backend on a
//!   dedicated run-loop thread.
//! - [`mock::MockEventSource`] is an enable flag plus direct injection, used
//!   by unit and integration tests.
//!
//! # Delivery contract
//!
//! The source invokes [`EventDelegate::deliver`] synchronously on a thread
//! the OS owns and expects a bounded-time return. Returning `None` means the
//! event is consumed/suppressed; returning the event back means it is
//! forwarded unmodified.

use taphub_core::RawEvent;

pub mod mock;
pub mod run_loop;

/// Error type for event source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to install event tap: {0}")]
    InstallFailed(String),
    #[error("failed to spawn {thread} thread: {source}")]
    ThreadSpawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Callback through which a source delivers every observed event.
///
/// The dispatcher implements this; sources hold it as `Arc<dyn EventDelegate>`.
pub trait EventDelegate: Send + Sync {
    /// Handles one raw event on the source's delivery thread.
    ///
    /// Returns `None` when the event was consumed, or the event to forward
    /// unmodified.
    fn deliver(&self, event: RawEvent) -> Option<RawEvent>;
}

/// Abstract capability over the OS interception point.
///
/// At most one source is associated with a dispatcher at a time; the
/// association is swappable at runtime.
pub trait EventSource: Send + Sync {
    /// Enables or disables event observation.
    ///
    /// Must be idempotent: enabling an enabled source (or disabling a
    /// disabled one) performs no transition. Enabling stands up OS
    /// resources and may complete asynchronously; `is_enabled` reflects the
    /// requested state as soon as the transition is underway.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the OS refuses the transition. The
    /// dispatcher logs and absorbs such failures.
    fn set_enabled(&self, enabled: bool) -> Result<(), SourceError>;

    /// Current (requested) enablement state.
    fn is_enabled(&self) -> bool;
}
