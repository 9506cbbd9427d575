//! External prerequisite inputs.
//!
//! Three of the six pipeline prerequisites describe the outside world:
//! display power, device power, and the accessibility permission. The host
//! application observes those through OS notifications and hands the
//! dispatcher a [`PrereqFeed`]: an unbounded change channel plus a one-shot
//! accessibility probe queried at construction. OS notification names never
//! appear inside the dispatch layer; whatever watches them just pushes
//! [`PrereqChange`] values into the channel.
//!
//! The change stream is expected never to fail; a host that cannot observe a
//! condition simply never sends changes for it.

use taphub_core::PrereqChange;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One-shot probe for the accessibility permission, queried once when the
/// dispatcher is constructed.
pub type AccessibilityProbe = Box<dyn Fn() -> bool + Send>;

/// The externally supplied prerequisite inputs consumed by a dispatcher.
pub struct PrereqFeed {
    /// Unbounded sequence of changes to the externally sourced flags.
    pub changes: UnboundedReceiver<PrereqChange>,
    /// Initial accessibility state.
    pub accessibility_probe: AccessibilityProbe,
}

impl PrereqFeed {
    /// Creates a feed from an existing change receiver and probe.
    pub fn new(
        changes: UnboundedReceiver<PrereqChange>,
        probe: impl Fn() -> bool + Send + 'static,
    ) -> Self {
        Self {
            changes,
            accessibility_probe: Box::new(probe),
        }
    }

    /// Creates a feed with a fixed probe answer and returns the sender side
    /// of the change channel. Dropping the sender ends the stream.
    pub fn channel(accessibility_granted: bool) -> (Self, UnboundedSender<PrereqChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(rx, move || accessibility_granted), tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taphub_core::Prereq;

    #[test]
    fn test_channel_feed_carries_changes() {
        // Arrange
        let (mut feed, tx) = PrereqFeed::channel(true);

        // Act
        tx.send(PrereqChange::Remove(Prereq::ScreensAwake))
            .expect("send");

        // Assert
        assert!((feed.accessibility_probe)());
        let change = feed.changes.try_recv().expect("change queued");
        assert_eq!(change, PrereqChange::Remove(Prereq::ScreensAwake));
    }

    #[test]
    fn test_dropping_sender_ends_the_stream() {
        let (mut feed, tx) = PrereqFeed::channel(false);
        drop(tx);
        assert!(feed.changes.try_recv().is_err());
    }
}
