//! # taphub-dispatch
//!
//! A thread-safe dispatch layer between a low-level OS input-event source
//! and application event-handling logic.
//!
//! Raw HID events flow from an [`EventSource`] into the [`Dispatcher`],
//! which routes each event through the attached receivers in descending
//! priority order. Every receiver decides whether the event is consumed
//! ([`Instruction::Retain`]), passed on ([`Instruction::Pass`]), or
//! forwarded while skipping the rest of the pipeline
//! ([`Instruction::Bypass`]). The dispatcher enables and disables the
//! source automatically from six runtime prerequisites: the manual
//! override, display and device power, the accessibility permission, the
//! presence of receivers, and the absence of suspensions.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taphub_core::Instruction;
//! use taphub_dispatch::{Dispatcher, MockEventSource, PrereqFeed};
//!
//! # async fn example() {
//! let (feed, _changes) = PrereqFeed::channel(true);
//! let dispatcher = Dispatcher::new(feed);
//!
//! let _handle = dispatcher.add_receiver(|event| {
//!     println!("saw {:?}", event.kind());
//!     Instruction::Pass
//! });
//!
//! let source = Arc::new(MockEventSource::new(dispatcher.delegate()));
//! dispatcher.set_event_source(Some(source));
//! # }
//! ```

pub mod application;
pub mod infrastructure;

pub use application::dispatch::Dispatcher;
pub use application::registry::{RawEventHandler, ReceiverHandle, DEFAULT_PRIORITY};
pub use application::stats::StatsSnapshot;
pub use application::stream::EventStream;
pub use application::suspension::SuspensionGuard;
pub use infrastructure::config::{DispatchOptions, OptionsError};
pub use infrastructure::event_source::mock::MockEventSource;
pub use infrastructure::event_source::run_loop::{RunLoopEventSource, TapBackend};
pub use infrastructure::event_source::{EventDelegate, EventSource, SourceError};
pub use infrastructure::prereq_feed::{AccessibilityProbe, PrereqFeed};

// Re-export the core event model so hosts depend on one crate.
pub use taphub_core::{
    CopyError, EventBody, EventKind, Instruction, MouseButton, NativeEvent, Prereq, PrereqChange,
    PrereqSet, RawEvent, ReceiverId, SuspensionId,
};
