//! Infrastructure for the dispatch layer.
//!
//! Everything that touches the world outside the dispatcher's own state lives
//! here, behind traits the application layer depends on:
//!
//! - **`event_source`** – The OS interception point abstraction, a mock
//!   double, and the run-loop lifecycle host for real backends.
//! - **`prereq_feed`** – The channel through which the host delivers power
//!   and permission changes.
//! - **`config`** – TOML-friendly dispatcher tuning options.

pub mod config;
pub mod event_source;
pub mod prereq_feed;
