//! # taphub-core
//!
//! Shared foundation for TapHub, a thread-safe dispatch layer that routes
//! raw HID events (keyboard/mouse) from an OS-level event source through
//! priority-ordered receivers.
//!
//! This crate has zero dependencies on OS APIs, runtimes, or I/O. It defines:
//!
//! - **`event`** – The raw event model: what the event source delivers and
//!   how per-receiver copies are made (including the fallible duplication of
//!   OS-owned native events).
//!
//! - **`instruction`** – The three-way decision a receiver returns after
//!   seeing an event: retain it, pass it on, or bypass the rest of the
//!   pipeline.
//!
//! - **`prereq`** – The six boolean conditions that must all hold for the
//!   pipeline to be live, packed into a small bitset.
//!
//! - **`id`** – Opaque identities for receivers and suspensions. Removal is
//!   always by identity, never by value equality.

pub mod event;
pub mod id;
pub mod instruction;
pub mod prereq;

// Re-export the most-used types at the crate root so callers can write
// `taphub_core::RawEvent` instead of `taphub_core::event::RawEvent`.
pub use event::{CopyError, EventBody, EventKind, MouseButton, NativeEvent, RawEvent};
pub use id::{ReceiverId, SuspensionId};
pub use instruction::Instruction;
pub use prereq::{Prereq, PrereqChange, PrereqSet};
