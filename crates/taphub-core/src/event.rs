//! Raw HID event model.
//!
//! Events originate in an OS-level event source (an "event tap") and are
//! routed through registered receivers. The dispatch layer never interprets
//! payloads (no keycode mapping, no gesture recognition); it only carries
//! them.
//!
//! Every receiver is handed an *independent copy* of the event so that one
//! receiver can never observe mutations made by another. A [`RawEvent`]
//! therefore bundles cheap plain data (cloned freely) with an optional handle
//! to the OS-owned native event, whose duplication goes through the OS and
//! can fail. A failed copy skips the affected receiver only; it never aborts
//! the whole dispatch.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Classification of a raw event as reported by the event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A key was pressed down.
    KeyDown,
    /// A key was released.
    KeyUp,
    /// A modifier key changed state.
    FlagsChanged,
    /// The pointer moved with no button held.
    MouseMoved,
    /// A mouse button was pressed.
    MouseDown,
    /// A mouse button was released.
    MouseUp,
    /// The pointer moved while a button was held.
    MouseDragged,
    /// The scroll wheel moved.
    ScrollWheel,
    /// The OS revoked the event source because a callback exceeded its time
    /// budget. Delivered *through* the source as a synthetic event.
    SourceDisabledByTimeout,
    /// The OS revoked the event source on behalf of the user.
    SourceDisabledByUserInput,
}

impl EventKind {
    /// `true` for the kinds that signal the OS has forcibly revoked the
    /// source rather than describing an input.
    pub fn is_revocation(self) -> bool {
        matches!(
            self,
            EventKind::SourceDisabledByTimeout | EventKind::SourceDisabledByUserInput
        )
    }
}

/// Mouse button identifier carried in pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    X1,
    X2,
}

/// Plain data carried alongside the event kind.
///
/// The dispatch layer treats these fields as opaque cargo; only the event
/// source that produced them and the receivers that consume them assign
/// meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBody {
    /// Keyboard event payload.
    Key {
        /// Hardware-level key code, uninterpreted.
        code: u16,
        /// `true` when the OS marked this as an auto-repeat.
        autorepeat: bool,
    },
    /// Pointer event payload in global display coordinates.
    Pointer {
        x: f64,
        y: f64,
        /// The button involved, if the kind is a press/release/drag.
        button: Option<MouseButton>,
    },
    /// Scroll wheel payload.
    Scroll { delta_x: i32, delta_y: i32 },
    /// Control events (source revocation) carry no payload.
    Marker,
}

/// Handle to the OS-owned twin of a [`RawEvent`].
///
/// Real event sources back each delivered event with an OS object; copying
/// that object allocates inside the OS and can fail. Implementations report
/// a failed copy by returning `None`.
pub trait NativeEvent: Send + Sync {
    /// Produces an independent copy of the native event, or `None` if the OS
    /// refused the copy.
    fn duplicate(&self) -> Option<Arc<dyn NativeEvent>>;
}

/// Error type for per-receiver event duplication.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CopyError {
    /// The OS-owned native event could not be copied.
    #[error("native event refused duplication")]
    NativeCopyFailed,
}

/// A raw event as delivered by the event source.
///
/// Construction is cheap; [`RawEvent::duplicate`] is the only fallible
/// operation and is performed once per receiver by the dispatcher.
pub struct RawEvent {
    kind: EventKind,
    /// Microseconds since an arbitrary epoch chosen by the event source.
    timestamp_us: u64,
    body: EventBody,
    native: Option<Arc<dyn NativeEvent>>,
}

impl RawEvent {
    /// Creates an event with plain data only.
    pub fn new(kind: EventKind, timestamp_us: u64, body: EventBody) -> Self {
        Self {
            kind,
            timestamp_us,
            body,
            native: None,
        }
    }

    /// Creates an event backed by an OS-owned native twin.
    pub fn with_native(
        kind: EventKind,
        timestamp_us: u64,
        body: EventBody,
        native: Arc<dyn NativeEvent>,
    ) -> Self {
        Self {
            kind,
            timestamp_us,
            body,
            native: Some(native),
        }
    }

    /// Creates a payload-free control event, e.g. a source revocation signal.
    pub fn marker(kind: EventKind) -> Self {
        Self::new(kind, 0, EventBody::Marker)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn body(&self) -> &EventBody {
        &self.body
    }

    /// Produces an independent copy for a single receiver.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError::NativeCopyFailed`] when the event is backed by a
    /// native twin and the OS refuses the copy. Plain events always copy.
    pub fn duplicate(&self) -> Result<RawEvent, CopyError> {
        let native = match &self.native {
            Some(native) => Some(native.duplicate().ok_or(CopyError::NativeCopyFailed)?),
            None => None,
        };
        Ok(RawEvent {
            kind: self.kind,
            timestamp_us: self.timestamp_us,
            body: self.body.clone(),
            native,
        })
    }
}

// Manual Debug: the native handle is opaque and carries no Debug bound.
impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("kind", &self.kind)
            .field("timestamp_us", &self.timestamp_us)
            .field("body", &self.body)
            .field("native", &self.native.is_some())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Native twin that counts duplications and can be told to refuse them.
    struct CountingNative {
        copies: Arc<AtomicU32>,
        refuse: bool,
    }

    impl NativeEvent for CountingNative {
        fn duplicate(&self) -> Option<Arc<dyn NativeEvent>> {
            if self.refuse {
                return None;
            }
            self.copies.fetch_add(1, Ordering::Relaxed);
            Some(Arc::new(CountingNative {
                copies: Arc::clone(&self.copies),
                refuse: false,
            }))
        }
    }

    #[test]
    fn test_revocation_kinds_are_classified() {
        assert!(EventKind::SourceDisabledByTimeout.is_revocation());
        assert!(EventKind::SourceDisabledByUserInput.is_revocation());
        assert!(!EventKind::KeyDown.is_revocation());
        assert!(!EventKind::ScrollWheel.is_revocation());
    }

    #[test]
    fn test_duplicate_plain_event_copies_body() {
        // Arrange
        let event = RawEvent::new(
            EventKind::KeyDown,
            42,
            EventBody::Key {
                code: 0x1E,
                autorepeat: false,
            },
        );

        // Act
        let copy = event.duplicate().expect("plain events always copy");

        // Assert
        assert_eq!(copy.kind(), EventKind::KeyDown);
        assert_eq!(copy.timestamp_us(), 42);
        assert_eq!(copy.body(), event.body());
    }

    #[test]
    fn test_duplicate_copies_native_twin() {
        // Arrange
        let copies = Arc::new(AtomicU32::new(0));
        let native = Arc::new(CountingNative {
            copies: Arc::clone(&copies),
            refuse: false,
        });
        let event = RawEvent::with_native(
            EventKind::MouseMoved,
            7,
            EventBody::Pointer {
                x: 10.0,
                y: 20.0,
                button: None,
            },
            native,
        );

        // Act
        let _first = event.duplicate().expect("copy");
        let _second = event.duplicate().expect("copy");

        // Assert – each duplicate went through the native twin
        assert_eq!(copies.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_duplicate_fails_when_native_refuses() {
        // Arrange
        let native = Arc::new(CountingNative {
            copies: Arc::new(AtomicU32::new(0)),
            refuse: true,
        });
        let event = RawEvent::with_native(
            EventKind::KeyUp,
            0,
            EventBody::Key {
                code: 1,
                autorepeat: false,
            },
            native,
        );

        // Act
        let result = event.duplicate();

        // Assert
        assert_eq!(result.unwrap_err(), CopyError::NativeCopyFailed);
    }

    #[test]
    fn test_marker_event_has_no_payload() {
        let event = RawEvent::marker(EventKind::SourceDisabledByTimeout);
        assert_eq!(event.body(), &EventBody::Marker);
        assert_eq!(event.timestamp_us(), 0);
    }
}
