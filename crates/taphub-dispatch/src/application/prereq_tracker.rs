//! Cached external prerequisite state.
//!
//! The tracker holds the three externally sourced flags (display power,
//! device power, accessibility permission). The other three prerequisites
//! are derived on demand by the dispatcher from its own state, so they never
//! appear here.
//!
//! Consecutive changes that collapse to the same effective set are
//! deduplicated: [`apply`](PrereqTracker::apply) reports whether anything
//! actually changed, and the dispatcher only reconciles when it did.

use std::sync::Mutex;

use taphub_core::{Prereq, PrereqChange, PrereqSet};
use tracing::{debug, warn};

/// Cache of the externally sourced prerequisite flags.
pub(crate) struct PrereqTracker {
    external: Mutex<PrereqSet>,
}

impl PrereqTracker {
    /// Creates the tracker from the construction-time accessibility probe.
    ///
    /// Screens and device are assumed awake at boot; the change stream
    /// corrects that assumption if it is wrong.
    pub(crate) fn new(accessibility_granted: bool) -> Self {
        let mut external = PrereqSet::empty()
            .with(Prereq::ScreensAwake)
            .with(Prereq::DeviceAwake);
        if accessibility_granted {
            external.insert(Prereq::AccessibilityGranted);
        }
        Self {
            external: Mutex::new(external),
        }
    }

    /// Applies one change and returns whether the effective set changed.
    ///
    /// Changes naming a non-external flag violate the change source contract
    /// and are ignored.
    pub(crate) fn apply(&self, change: PrereqChange) -> bool {
        if !change.prereq().is_external() {
            warn!(?change, "change source sent a non-external prerequisite; ignoring");
            return false;
        }
        let mut guard = self.external.lock().expect("lock poisoned");
        let before = *guard;
        match change {
            PrereqChange::Add(flag) => guard.insert(flag),
            PrereqChange::Remove(flag) => guard.remove(flag),
        }
        let changed = *guard != before;
        if changed {
            debug!(external = ?*guard, "external prerequisites changed");
        }
        changed
    }

    /// Current externally sourced flags.
    pub(crate) fn external(&self) -> PrereqSet {
        *self.external.lock().expect("lock poisoned")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_state_assumes_awake() {
        // Arrange / Act
        let tracker = PrereqTracker::new(true);
        let external = tracker.external();

        // Assert
        assert!(external.contains(Prereq::ScreensAwake));
        assert!(external.contains(Prereq::DeviceAwake));
        assert!(external.contains(Prereq::AccessibilityGranted));
    }

    #[test]
    fn test_probe_denied_leaves_accessibility_unset() {
        let tracker = PrereqTracker::new(false);
        assert!(!tracker.external().contains(Prereq::AccessibilityGranted));
    }

    #[test]
    fn test_apply_remove_then_add_round_trips() {
        // Arrange
        let tracker = PrereqTracker::new(true);

        // Act / Assert
        assert!(tracker.apply(PrereqChange::Remove(Prereq::DeviceAwake)));
        assert!(!tracker.external().contains(Prereq::DeviceAwake));
        assert!(tracker.apply(PrereqChange::Add(Prereq::DeviceAwake)));
        assert!(tracker.external().contains(Prereq::DeviceAwake));
    }

    #[test]
    fn test_duplicate_changes_are_deduplicated() {
        // Arrange
        let tracker = PrereqTracker::new(true);

        // Act / Assert – adding an already-present flag is not a change
        assert!(!tracker.apply(PrereqChange::Add(Prereq::ScreensAwake)));
        assert!(tracker.apply(PrereqChange::Remove(Prereq::ScreensAwake)));
        assert!(!tracker.apply(PrereqChange::Remove(Prereq::ScreensAwake)));
    }

    #[test]
    fn test_non_external_changes_are_ignored() {
        // Arrange
        let tracker = PrereqTracker::new(true);
        let before = tracker.external();

        // Act
        let changed = tracker.apply(PrereqChange::Remove(Prereq::HasReceivers));

        // Assert
        assert!(!changed);
        assert_eq!(tracker.external(), before);
    }
}
