//! Pipeline prerequisites.
//!
//! Six independent boolean conditions must all hold for the dispatch pipeline
//! to be live. Three of them describe the outside world and are fed to the
//! dispatcher as a change stream; the other three are derived on demand from
//! the dispatcher's own state.
//!
//! The aggregate state is a [`PrereqSet`], a bitset over the six flags. The
//! pipeline "should be active" if and only if the set equals
//! [`PrereqSet::ALL`].

use std::fmt;

/// One of the six conditions gating the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prereq {
    /// Manual on/off override exposed on the dispatcher.
    Enabled,
    /// All displays are awake.
    ScreensAwake,
    /// The device is not asleep.
    DeviceAwake,
    /// The process holds the accessibility permission required to observe
    /// input events.
    AccessibilityGranted,
    /// At least one receiver is attached.
    HasReceivers,
    /// No suspension token is currently held.
    NoSuspensions,
}

impl Prereq {
    /// All six flags, in bit order.
    pub const ALL: [Prereq; 6] = [
        Prereq::Enabled,
        Prereq::ScreensAwake,
        Prereq::DeviceAwake,
        Prereq::AccessibilityGranted,
        Prereq::HasReceivers,
        Prereq::NoSuspensions,
    ];

    const fn bit(self) -> u8 {
        match self {
            Prereq::Enabled => 1 << 0,
            Prereq::ScreensAwake => 1 << 1,
            Prereq::DeviceAwake => 1 << 2,
            Prereq::AccessibilityGranted => 1 << 3,
            Prereq::HasReceivers => 1 << 4,
            Prereq::NoSuspensions => 1 << 5,
        }
    }

    /// `true` for the flags supplied by the outside world (power state,
    /// permission). The remaining three are derived from dispatcher state
    /// and may not appear in a [`PrereqChange`].
    pub fn is_external(self) -> bool {
        matches!(
            self,
            Prereq::ScreensAwake | Prereq::DeviceAwake | Prereq::AccessibilityGranted
        )
    }
}

/// Set of [`Prereq`] flags packed into a byte.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct PrereqSet(u8);

impl PrereqSet {
    /// The empty set.
    pub const EMPTY: PrereqSet = PrereqSet(0);

    /// All six flags. The pipeline is live exactly when the aggregate set
    /// equals this value.
    pub const ALL: PrereqSet = PrereqSet(0b0011_1111);

    pub fn empty() -> Self {
        Self::EMPTY
    }

    pub fn insert(&mut self, flag: Prereq) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: Prereq) {
        self.0 &= !flag.bit();
    }

    /// Returns a copy of the set with `flag` added.
    pub fn with(mut self, flag: Prereq) -> Self {
        self.insert(flag);
        self
    }

    /// Returns a copy of the set with `flag` removed.
    pub fn without(mut self, flag: Prereq) -> Self {
        self.remove(flag);
        self
    }

    pub fn contains(self, flag: Prereq) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn union(self, other: PrereqSet) -> PrereqSet {
        PrereqSet(self.0 | other.0)
    }

    /// `true` when every one of the six flags is present.
    pub fn is_all(self) -> bool {
        self == Self::ALL
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the flags present in the set, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Prereq> {
        Prereq::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<Prereq> for PrereqSet {
    fn from_iter<I: IntoIterator<Item = Prereq>>(iter: I) -> Self {
        let mut set = PrereqSet::empty();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

// Debug lists flag names instead of the raw byte so tracing output reads as
// e.g. `{Enabled, DeviceAwake}`.
impl fmt::Debug for PrereqSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A single change to one of the externally supplied flags.
///
/// The change source is restricted by contract to external flags
/// ([`Prereq::is_external`]); the dispatcher ignores anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrereqChange {
    /// The condition now holds.
    Add(Prereq),
    /// The condition no longer holds.
    Remove(Prereq),
}

impl PrereqChange {
    /// The flag this change refers to.
    pub fn prereq(self) -> Prereq {
        match self {
            PrereqChange::Add(p) | PrereqChange::Remove(p) => p,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_are_distinct() {
        // Arrange / Act
        let mut seen = 0u8;
        for flag in Prereq::ALL {
            // Assert – no two flags share a bit
            assert_eq!(seen & flag.bit(), 0, "{flag:?} overlaps another flag");
            seen |= flag.bit();
        }
    }

    #[test]
    fn test_all_is_the_union_of_every_flag() {
        let set: PrereqSet = Prereq::ALL.into_iter().collect();
        assert!(set.is_all());
        assert_eq!(set, PrereqSet::ALL);
    }

    #[test]
    fn test_removing_any_flag_breaks_is_all() {
        for flag in Prereq::ALL {
            let set = PrereqSet::ALL.without(flag);
            assert!(!set.is_all(), "removing {flag:?} must break the conjunction");
        }
    }

    #[test]
    fn test_insert_remove_round_trip() {
        // Arrange
        let mut set = PrereqSet::empty();

        // Act
        set.insert(Prereq::DeviceAwake);
        set.insert(Prereq::Enabled);
        set.remove(Prereq::DeviceAwake);

        // Assert
        assert!(set.contains(Prereq::Enabled));
        assert!(!set.contains(Prereq::DeviceAwake));
    }

    #[test]
    fn test_exactly_three_flags_are_external() {
        let external: Vec<Prereq> = Prereq::ALL.into_iter().filter(|p| p.is_external()).collect();
        assert_eq!(
            external,
            vec![
                Prereq::ScreensAwake,
                Prereq::DeviceAwake,
                Prereq::AccessibilityGranted
            ]
        );
    }

    #[test]
    fn test_change_exposes_its_flag() {
        assert_eq!(
            PrereqChange::Add(Prereq::ScreensAwake).prereq(),
            Prereq::ScreensAwake
        );
        assert_eq!(
            PrereqChange::Remove(Prereq::DeviceAwake).prereq(),
            Prereq::DeviceAwake
        );
    }

    #[test]
    fn test_debug_lists_flag_names() {
        let set = PrereqSet::empty().with(Prereq::Enabled).with(Prereq::NoSuspensions);
        let rendered = format!("{set:?}");
        assert!(rendered.contains("Enabled"));
        assert!(rendered.contains("NoSuspensions"));
    }
}
