//! Event streams.
//!
//! A receiver can be consumed as a lazy sequence of events instead of a
//! callback: every event the backing receiver sees is forwarded into the
//! stream with `Pass`, so a stream observes without consuming. Dropping the
//! stream detaches the backing receiver through the handle's single-fire
//! path, so a cancelled consumer leaves no dangling registry entry.

use taphub_core::RawEvent;
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};

use super::registry::ReceiverHandle;

/// A cancellable sequence of dispatched events.
///
/// Created by [`Dispatcher::stream`](super::dispatch::Dispatcher::stream).
pub struct EventStream {
    events: UnboundedReceiver<RawEvent>,
    handle: ReceiverHandle,
}

impl EventStream {
    pub(crate) fn new(events: UnboundedReceiver<RawEvent>, handle: ReceiverHandle) -> Self {
        Self { events, handle }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the dispatcher is gone and all buffered events
    /// have been drained.
    pub async fn recv(&mut self) -> Option<RawEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<RawEvent, TryRecvError> {
        self.events.try_recv()
    }

    /// The backing receiver's handle, e.g. to adjust its priority.
    pub fn handle(&self) -> &ReceiverHandle {
        &self.handle
    }
}
