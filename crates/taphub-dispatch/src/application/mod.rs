//! Application layer of the dispatch pipeline.
//!
//! The modules here hold the pipeline's behavior and state; they depend on
//! the infrastructure layer only through traits (`EventSource`,
//! `EventDelegate`), so every piece is unit-testable without an OS
//! interception point.
//!
//! # Sub-modules
//!
//! - **`dispatch`** – The dispatcher root: the priority-ordered dispatch
//!   algorithm, the prerequisite reconciliation step, and the self-heal
//!   cycle after OS revocation. This is the hot path; it runs on every
//!   keystroke and mouse movement.
//!
//! - **`registry`** – The owned collection of attached receivers and the
//!   single-fire handles callers use to mutate or detach them.
//!
//! - **`prereq_tracker`** – The cached external prerequisite flags with
//!   change deduplication.
//!
//! - **`suspension`** – Reference-counted suspension tokens that force the
//!   pipeline inactive while held.
//!
//! - **`stream`** – Receivers exposed as cancellable event sequences.
//!
//! - **`stats`** – Lock-free dispatch counters.

pub mod dispatch;
pub mod prereq_tracker;
pub mod registry;
pub mod stats;
pub mod stream;
pub mod suspension;
