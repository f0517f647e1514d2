//! The match record: two sides, a format, and the scheduling handshake.
//!
//! A [`Match`] is plain data with synchronous mutators. It never persists
//! itself; the match room commits it after every successful mutation.

use chrono::{DateTime, TimeZone, Utc};
use lockstep_protocol::{MatchId, Participant, RaceId, Side, UserId};
use lockstep_race::RaceInfo;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Format and tally
// ---------------------------------------------------------------------------

/// How many races a match runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchFormat {
    /// Ends once one side has won a majority of `n` races.
    BestOf(u32),
    /// Ends after exactly `n` finished races, whoever wins them.
    Repeat(u32),
}

impl MatchFormat {
    pub fn is_complete(self, tally: &MatchRaceTally) -> bool {
        match self {
            Self::BestOf(n) => tally.wins.iter().any(|&w| w > n / 2),
            Self::Repeat(n) => tally.finished >= n,
        }
    }
}

impl Default for MatchFormat {
    fn default() -> Self {
        Self::BestOf(3)
    }
}

impl std::fmt::Display for MatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestOf(n) => write!(f, "best of {n}"),
            Self::Repeat(n) => write!(f, "repeat {n}"),
        }
    }
}

/// One persisted race of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRaceRecord {
    pub match_id: MatchId,
    /// 1-based, counting canceled races too.
    pub race_number: u32,
    /// `None` for a canceled race that never finalized.
    pub race_id: Option<RaceId>,
    /// `None` is a draw or no decision.
    pub winner: Option<Side>,
    pub canceled: bool,
    pub contested: bool,
}

/// Aggregate of a match's recorded races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchRaceTally {
    /// Races that finalized (not canceled).
    pub finished: u32,
    pub canceled: u32,
    /// Wins per side, indexed by [`Side::index`].
    pub wins: [u32; 2],
}

impl MatchRaceTally {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a MatchRaceRecord>) -> Self {
        let mut tally = Self::default();
        for record in records {
            if record.canceled {
                tally.canceled += 1;
                continue;
            }
            tally.finished += 1;
            if let Some(side) = record.winner {
                tally.wins[side.index()] += 1;
            }
        }
        tally
    }

    /// Number the next race of the match will get.
    pub fn next_race_number(&self) -> u32 {
        self.finished + self.canceled + 1
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// What an unconfirm request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unconfirm {
    /// Both sides agree (or only one had confirmed): the time is gone.
    Cleared,
    /// Recorded this side's wish; waiting for the other side.
    Requested,
    /// Nothing to unconfirm.
    Unchanged,
}

/// A scheduled series of races between two participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    id: Option<MatchId>,
    sides: [Participant; 2],
    cawmentator: Option<Participant>,
    suggested_time: Option<DateTime<Utc>>,
    confirmed: [bool; 2],
    wants_unconfirm: [bool; 2],
    format: MatchFormat,
    ranked: bool,
    race_info: RaceInfo,
    finish_time: Option<DateTime<Utc>>,
}

impl Match {
    /// An unscheduled, unranked best-of-3 that has never been committed.
    pub fn new(one: Participant, two: Participant, race_info: RaceInfo) -> Self {
        Self {
            id: None,
            sides: [one, two],
            cawmentator: None,
            suggested_time: None,
            confirmed: [false; 2],
            wants_unconfirm: [false; 2],
            format: MatchFormat::default(),
            ranked: false,
            race_info,
            finish_time: None,
        }
    }

    pub fn id(&self) -> Option<MatchId> {
        self.id
    }

    /// Called with the id a store assigned on first commit.
    pub fn set_id(&mut self, id: MatchId) {
        self.id = Some(id);
    }

    pub fn participant(&self, side: Side) -> &Participant {
        &self.sides[side.index()]
    }

    pub fn side_of(&self, user: UserId) -> Option<Side> {
        [Side::One, Side::Two]
            .into_iter()
            .find(|side| self.sides[side.index()].id == user)
    }

    pub fn cawmentator(&self) -> Option<&Participant> {
        self.cawmentator.as_ref()
    }

    pub fn suggested_time(&self) -> Option<DateTime<Utc>> {
        self.suggested_time
    }

    pub fn is_confirmed_by(&self, side: Side) -> bool {
        self.confirmed[side.index()]
    }

    pub fn wants_unconfirm(&self, side: Side) -> bool {
        self.wants_unconfirm[side.index()]
    }

    pub fn format(&self) -> MatchFormat {
        self.format
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked
    }

    pub fn race_info(&self) -> &RaceInfo {
        &self.race_info
    }

    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    /// A time is suggested and both sides have confirmed it.
    pub fn is_scheduled(&self) -> bool {
        self.suggested_time.is_some() && self.confirmed.iter().all(|&c| c)
    }

    pub fn is_complete(&self, tally: &MatchRaceTally) -> bool {
        self.format.is_complete(tally)
    }

    /// Proposes a start time, stored in UTC. Always wipes both sides'
    /// confirmations and unconfirm wishes.
    pub fn suggest_time<Tz: TimeZone>(&mut self, time: DateTime<Tz>) {
        self.suggested_time = Some(time.with_timezone(&Utc));
        self.clear_flags();
    }

    pub fn confirm(&mut self, side: Side) -> bool {
        if self.suggested_time.is_none() || self.confirmed[side.index()] {
            return false;
        }
        self.confirmed[side.index()] = true;
        true
    }

    /// Withdraws a confirmation. Once both sides had confirmed, the time is
    /// only cleared when both ask for it.
    pub fn unconfirm(&mut self, side: Side) -> Unconfirm {
        if self.suggested_time.is_none() {
            return Unconfirm::Unchanged;
        }
        let other = side.other().index();
        if !self.confirmed[other] || self.wants_unconfirm[other] {
            self.suggested_time = None;
            self.clear_flags();
            return Unconfirm::Cleared;
        }
        if self.wants_unconfirm[side.index()] {
            return Unconfirm::Unchanged;
        }
        self.wants_unconfirm[side.index()] = true;
        Unconfirm::Requested
    }

    /// Admin override: both sides confirm the suggested time.
    pub fn force_confirm(&mut self) -> bool {
        if self.suggested_time.is_none() || self.is_scheduled() {
            return false;
        }
        self.confirmed = [true; 2];
        self.wants_unconfirm = [false; 2];
        true
    }

    /// Admin override: drops both confirmations. The suggested time stays
    /// so the sides can re-confirm it.
    pub fn force_unconfirm(&mut self) -> bool {
        if self.confirmed == [false; 2] && self.wants_unconfirm == [false; 2] {
            return false;
        }
        self.clear_flags();
        true
    }

    pub fn set_best_of(&mut self, n: u32) -> bool {
        self.set_format(MatchFormat::BestOf(n))
    }

    pub fn set_repeat(&mut self, n: u32) -> bool {
        self.set_format(MatchFormat::Repeat(n))
    }

    pub fn set_ranked(&mut self, ranked: bool) -> bool {
        let changed = self.ranked != ranked;
        self.ranked = ranked;
        changed
    }

    pub fn set_cawmentator(&mut self, cawmentator: Option<Participant>) -> bool {
        if self.cawmentator == cawmentator {
            return false;
        }
        self.cawmentator = cawmentator;
        true
    }

    pub(crate) fn mark_finished(&mut self, at: DateTime<Utc>) {
        self.finish_time = Some(at);
    }

    fn set_format(&mut self, format: MatchFormat) -> bool {
        let n = match format {
            MatchFormat::BestOf(n) | MatchFormat::Repeat(n) => n,
        };
        if n == 0 || self.format == format {
            return false;
        }
        self.format = format;
        true
    }

    fn clear_flags(&mut self) {
        self.confirmed = [false; 2];
        self.wants_unconfirm = [false; 2];
    }
}
