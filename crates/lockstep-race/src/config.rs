//! Race configuration, race info, and the race status machine.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RaceConfig
// ---------------------------------------------------------------------------

/// Timing and policy parameters for one race.
///
/// Immutable once a race is built: changing the rules means building a new
/// config for the *next* race. Nothing in a running race ever edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceConfig {
    /// Delay between "everyone is ready" and the start.
    pub countdown: Duration,

    /// Delay between an unpause request and the clock resuming.
    pub unpause_countdown: Duration,

    /// The last this-many seconds of a countdown are announced one by one.
    pub incremental_countdown_start: u32,

    /// Window between completion and recording, during which results can
    /// still be corrected.
    pub finalize_delay: Duration,

    /// Forfeit the last racer still running once somebody has finished.
    /// Matches turn this on so a race never hangs on one absent player.
    pub auto_forfeit_last_racer: bool,

    /// Do not start the countdown with a single entrant.
    pub require_at_least_two: bool,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(10),
            unpause_countdown: Duration::from_secs(3),
            incremental_countdown_start: 3,
            finalize_delay: Duration::from_secs(30),
            auto_forfeit_last_racer: false,
            require_at_least_two: true,
        }
    }
}

impl RaceConfig {
    /// Same timings with the match policy applied.
    pub fn for_match(&self) -> Self {
        Self {
            auto_forfeit_last_racer: true,
            require_at_least_two: true,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// RaceInfo
// ---------------------------------------------------------------------------

/// What is being raced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceInfo {
    /// Free-form description shown at the top of the leaderboard,
    /// e.g. "Cadence, seeded".
    pub description: String,

    /// Whether each race rolls a shared seed.
    pub seeded: bool,
}

impl Default for RaceInfo {
    fn default() -> Self {
        Self {
            description: "Any%".to_string(),
            seeded: false,
        }
    }
}

impl RaceInfo {
    pub fn new(description: impl Into<String>, seeded: bool) -> Self {
        Self {
            description: description.into(),
            seeded,
        }
    }

    /// A fresh seed for a seeded race, `None` otherwise.
    pub fn roll_seed(&self) -> Option<u32> {
        self.seeded
            .then(|| rand::rng().random_range(1..=99_999_999))
    }
}

// ---------------------------------------------------------------------------
// RaceStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a race.
///
/// Declaration order is lifecycle order, so `status < RaceStatus::Racing`
/// means "not started yet":
///
/// ```text
/// Uninitialized → EntryOpen ⇄ CountingDown → Racing ⇄ Paused
///                                              ⇅
///                                          Completed → Finalized
///
/// any non-terminal state → Cancelled
/// ```
///
/// The two backward edges (CountingDown → EntryOpen, Completed → Racing)
/// only happen through a successful timer cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaceStatus {
    Uninitialized,
    EntryOpen,
    CountingDown,
    Racing,
    Paused,
    Completed,
    Finalized,
    Cancelled,
}

impl RaceStatus {
    /// `Finalized` and `Cancelled` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }

    /// Returns `true` while racers may still enter or leave.
    pub fn is_pre_race(self) -> bool {
        matches!(self, Self::EntryOpen | Self::CountingDown)
    }

    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RaceStatus::*;
        match (self, target) {
            (from, Cancelled) => !from.is_terminal(),
            (Uninitialized, EntryOpen)
            | (EntryOpen, CountingDown)
            | (CountingDown, EntryOpen)
            | (CountingDown, Racing)
            | (Racing, Paused)
            | (Paused, Racing)
            | (Racing, Completed)
            | (Paused, Completed)
            | (Completed, Racing)
            | (Completed, Finalized) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Uninitialized => "Not initialized",
            Self::EntryOpen => "Entry open",
            Self::CountingDown => "Starting",
            Self::Racing => "In progress",
            Self::Paused => "Paused",
            Self::Completed => "Complete",
            Self::Finalized => "Results finalized",
            Self::Cancelled => "Race cancelled",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order_follows_lifecycle() {
        assert!(RaceStatus::EntryOpen < RaceStatus::CountingDown);
        assert!(RaceStatus::CountingDown < RaceStatus::Racing);
        assert!(RaceStatus::Paused > RaceStatus::Racing);
        assert!(RaceStatus::Completed < RaceStatus::Finalized);
    }

    #[test]
    fn test_rollback_edges_are_legal() {
        assert!(RaceStatus::CountingDown.can_transition_to(RaceStatus::EntryOpen));
        assert!(RaceStatus::Completed.can_transition_to(RaceStatus::Racing));
    }

    #[test]
    fn test_illegal_edges_rejected() {
        assert!(!RaceStatus::EntryOpen.can_transition_to(RaceStatus::Racing));
        assert!(!RaceStatus::Racing.can_transition_to(RaceStatus::Finalized));
        assert!(!RaceStatus::Finalized.can_transition_to(RaceStatus::Racing));
    }

    #[test]
    fn test_terminal_states_cannot_cancel() {
        assert!(RaceStatus::Racing.can_transition_to(RaceStatus::Cancelled));
        assert!(RaceStatus::Uninitialized.can_transition_to(RaceStatus::Cancelled));
        assert!(!RaceStatus::Finalized.can_transition_to(RaceStatus::Cancelled));
        assert!(!RaceStatus::Cancelled.can_transition_to(RaceStatus::Cancelled));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(RaceStatus::EntryOpen.to_string(), "Entry open");
        assert_eq!(RaceStatus::Finalized.to_string(), "Results finalized");
    }

    #[test]
    fn test_config_for_match_enables_auto_forfeit() {
        let base = RaceConfig::default();
        assert!(!base.auto_forfeit_last_racer);
        let matched = base.for_match();
        assert!(matched.auto_forfeit_last_racer);
        assert_eq!(matched.countdown, base.countdown);
    }

    #[test]
    fn test_roll_seed_only_when_seeded() {
        assert_eq!(RaceInfo::new("Any%", false).roll_seed(), None);
        let seed = RaceInfo::new("Seeded", true).roll_seed().unwrap();
        assert!((1..=99_999_999).contains(&seed));
    }
}
