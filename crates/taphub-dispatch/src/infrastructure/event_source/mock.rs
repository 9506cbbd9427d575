//! Mock event source for unit testing.
//!
//! Allows tests to inject synthetic [`RawEvent`]s and observe the
//! enable/disable transitions the dispatcher requests, without any OS
//! interception point.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use taphub_core::RawEvent;

use super::{EventDelegate, EventSource, SourceError};

/// A mock implementation of [`EventSource`] driven entirely by tests.
pub struct MockEventSource {
    delegate: Arc<dyn EventDelegate>,
    enabled: AtomicBool,
    /// Every `set_enabled` transition, in call order.
    transitions: Mutex<Vec<bool>>,
    fail_enable: AtomicBool,
}

impl MockEventSource {
    /// Creates a new mock source delivering to `delegate`.
    pub fn new(delegate: Arc<dyn EventDelegate>) -> Self {
        Self {
            delegate,
            enabled: AtomicBool::new(false),
            transitions: Mutex::new(Vec::new()),
            fail_enable: AtomicBool::new(false),
        }
    }

    /// Injects a synthetic event, as if observed by the OS.
    ///
    /// A disabled tap observes nothing: the event passes through untouched.
    /// Otherwise the delegate decides, exactly like the OS callback path.
    pub fn inject(&self, event: RawEvent) -> Option<RawEvent> {
        if !self.is_enabled() {
            return Some(event);
        }
        self.delegate.deliver(event)
    }

    /// Returns every `set_enabled` value received so far, in order.
    pub fn transitions(&self) -> Vec<bool> {
        self.transitions.lock().expect("lock poisoned").clone()
    }

    /// Makes subsequent `set_enabled` calls fail, for error-path tests.
    pub fn set_fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }
}

impl EventSource for MockEventSource {
    fn set_enabled(&self, enabled: bool) -> Result<(), SourceError> {
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(SourceError::InstallFailed("injected failure".to_string()));
        }
        self.enabled.store(enabled, Ordering::SeqCst);
        self.transitions.lock().expect("lock poisoned").push(enabled);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taphub_core::{EventBody, EventKind};

    /// Delegate that consumes key events and forwards everything else.
    struct KeyEater;

    impl EventDelegate for KeyEater {
        fn deliver(&self, event: RawEvent) -> Option<RawEvent> {
            if matches!(event.kind(), EventKind::KeyDown | EventKind::KeyUp) {
                None
            } else {
                Some(event)
            }
        }
    }

    fn key_down() -> RawEvent {
        RawEvent::new(
            EventKind::KeyDown,
            0,
            EventBody::Key {
                code: 0x1E,
                autorepeat: false,
            },
        )
    }

    #[test]
    fn test_disabled_source_passes_events_through() {
        // Arrange
        let source = MockEventSource::new(Arc::new(KeyEater));

        // Act – source was never enabled
        let result = source.inject(key_down());

        // Assert
        assert!(result.is_some(), "a disabled tap must not intercept");
    }

    #[test]
    fn test_enabled_source_delivers_to_delegate() {
        // Arrange
        let source = MockEventSource::new(Arc::new(KeyEater));
        source.set_enabled(true).expect("enable");

        // Act
        let result = source.inject(key_down());

        // Assert – the delegate consumed the key event
        assert!(result.is_none());
    }

    #[test]
    fn test_transitions_are_recorded_in_order() {
        // Arrange
        let source = MockEventSource::new(Arc::new(KeyEater));

        // Act
        source.set_enabled(true).expect("enable");
        source.set_enabled(false).expect("disable");
        source.set_enabled(true).expect("enable");

        // Assert
        assert_eq!(source.transitions(), vec![true, false, true]);
    }

    #[test]
    fn test_fail_enable_returns_error_and_keeps_state() {
        // Arrange
        let source = MockEventSource::new(Arc::new(KeyEater));
        source.set_fail_enable(true);

        // Act
        let result = source.set_enabled(true);

        // Assert
        assert!(result.is_err());
        assert!(!source.is_enabled());
        assert!(source.transitions().is_empty());
    }
}
