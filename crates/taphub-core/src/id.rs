//! Opaque identities for receivers and suspensions.
//!
//! Receivers and suspension tokens are removed by identity, never by value
//! equality. A fresh UUID per attach/acquire avoids the aliasing bugs that
//! come with comparing closures or records by content.

use std::fmt;

use uuid::Uuid;

/// Identity of an attached receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(Uuid);

impl ReceiverId {
    /// Generates a fresh, unique id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identity of an active suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SuspensionId(Uuid);

impl SuspensionId {
    /// Generates a fresh, unique id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SuspensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
