//! Core identity types shared by races and matches.
//!
//! Participants are owned by an external user directory. Everything in
//! lockstep refers to them through a [`UserId`] plus the display name that
//! was current when they entered, never through a live directory handle.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a participant in the external user directory.
///
/// Newtype wrapper so a `UserId` can never be passed where a `RaceId` is
/// expected. `#[serde(transparent)]` keeps it a plain number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// Durable identifier assigned by the persistence collaborator when a
/// finalized race is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaceId(pub u64);

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Durable identifier of a match. Assigned on the first commit; a match
/// that was never committed has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A reference to a participant: their id plus the name to display.
///
/// Equality is by id only. Two references with different display names
/// (a user renamed themselves mid-series) still denote the same person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Directory id.
    pub id: UserId,
    /// Display name at the time the reference was taken.
    pub name: String,
}

impl Participant {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl PartialEq for Participant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Participant {}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two seats in a match.
///
/// Per-side flags (confirmations, wins) are indexed by `Side` rather than
/// by participant so a match never has to compare names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    One,
    Two,
}

impl Side {
    /// The opposing seat.
    pub fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// `0` for side one, `1` for side two. Handy for `[T; 2]` storage.
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "side 1"),
            Self::Two => write!(f, "side 2"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&UserId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_ids_display_with_prefix() {
        assert_eq!(UserId(7).to_string(), "U-7");
        assert_eq!(RaceId(8).to_string(), "R-8");
        assert_eq!(MatchId(9).to_string(), "M-9");
    }

    #[test]
    fn test_participant_equality_ignores_name() {
        let a = Participant::new(UserId(1), "incnone");
        let renamed = Participant::new(UserId(1), "incnone_");
        let other = Participant::new(UserId(2), "incnone");
        assert_eq!(a, renamed);
        assert_ne!(a, other);
    }

    #[test]
    fn test_side_other_and_index() {
        assert_eq!(Side::One.other(), Side::Two);
        assert_eq!(Side::Two.other(), Side::One);
        assert_eq!(Side::One.index(), 0);
        assert_eq!(Side::Two.index(), 1);
    }
}
