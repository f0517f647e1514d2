//! Persistence and rating collaborators, plus an in-memory implementation.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use lockstep_protocol::{MatchId, Participant, RaceId, Side, UserId};
use lockstep_race::{RaceResult, RaceStore, StoreError};
use parking_lot::Mutex;

use crate::{Match, MatchRaceRecord, MatchRaceTally};

/// Durable storage for matches and their races.
///
/// Extends [`RaceStore`] so a match room can hand the same store to the
/// races it spawns.
#[async_trait]
pub trait MatchStore: RaceStore {
    /// Saves the match. The first call assigns and returns its id; later
    /// calls return the same id.
    async fn commit_match(&self, m: &Match) -> Result<MatchId, StoreError>;

    async fn record_match_race(&self, record: MatchRaceRecord) -> Result<(), StoreError>;

    async fn match_race_tally(&self, match_id: MatchId) -> Result<MatchRaceTally, StoreError>;

    /// Flags the most recent non-canceled race. `Ok(false)` if there is none.
    async fn set_last_race_contested(&self, match_id: MatchId) -> Result<bool, StoreError>;

    /// Every committed match without a finish time, for restart recovery.
    async fn incomplete_matches(&self) -> Result<Vec<Match>, StoreError>;
}

/// External rating system. Opaque to the engine.
#[async_trait]
pub trait RatingService: Send + Sync {
    /// Applies one race outcome and returns the new ratings of side one
    /// and side two. `winner == None` is a draw.
    async fn update_ratings(
        &self,
        one: &Participant,
        two: &Participant,
        winner: Option<Side>,
    ) -> Result<(f64, f64), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

const INITIAL_RATING: f64 = 1500.0;
const RATING_K: f64 = 32.0;

#[derive(Default)]
struct Inner {
    races: Vec<RaceResult>,
    matches: BTreeMap<MatchId, Match>,
    match_races: Vec<MatchRaceRecord>,
    ratings: HashMap<UserId, f64>,
    failing: bool,
}

/// Process-local store and rating service. Nothing survives a restart;
/// meant for tests, demos, and single-process deployments that do not
/// care about history.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write fails with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().failing = failing;
    }

    pub fn recorded_races(&self) -> Vec<RaceResult> {
        self.inner.lock().races.clone()
    }

    pub fn match_races(&self, match_id: MatchId) -> Vec<MatchRaceRecord> {
        self.inner
            .lock()
            .match_races
            .iter()
            .filter(|r| r.match_id == match_id)
            .cloned()
            .collect()
    }

    pub fn stored_match(&self, match_id: MatchId) -> Option<Match> {
        self.inner.lock().matches.get(&match_id).cloned()
    }

    pub fn rating(&self, user: UserId) -> f64 {
        self.inner
            .lock()
            .ratings
            .get(&user)
            .copied()
            .unwrap_or(INITIAL_RATING)
    }

    fn check(inner: &Inner) -> Result<(), StoreError> {
        if inner.failing {
            return Err(StoreError::Unavailable("memory store set to fail".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RaceStore for MemoryStore {
    async fn record_race(&self, result: &RaceResult) -> Result<RaceId, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        inner.races.push(result.clone());
        Ok(RaceId(inner.races.len() as u64))
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn commit_match(&self, m: &Match) -> Result<MatchId, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        let id = match m.id() {
            Some(id) => id,
            None => MatchId(inner.matches.keys().next_back().map_or(1, |last| last.0 + 1)),
        };
        let mut stored = m.clone();
        stored.set_id(id);
        inner.matches.insert(id, stored);
        Ok(id)
    }

    async fn record_match_race(&self, record: MatchRaceRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        if !inner.matches.contains_key(&record.match_id) {
            return Err(StoreError::NotFound(record.match_id.to_string()));
        }
        inner.match_races.push(record);
        Ok(())
    }

    async fn match_race_tally(&self, match_id: MatchId) -> Result<MatchRaceTally, StoreError> {
        let inner = self.inner.lock();
        Ok(MatchRaceTally::from_records(
            inner.match_races.iter().filter(|r| r.match_id == match_id),
        ))
    }

    async fn set_last_race_contested(&self, match_id: MatchId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        let last = inner
            .match_races
            .iter_mut()
            .rev()
            .find(|r| r.match_id == match_id && !r.canceled);
        Ok(match last {
            Some(record) => {
                record.contested = true;
                true
            }
            None => false,
        })
    }

    async fn incomplete_matches(&self) -> Result<Vec<Match>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .matches
            .values()
            .filter(|m| m.finish_time().is_none())
            .cloned()
            .collect())
    }
}

/// Plain Elo, so ranked matches have something to call.
#[async_trait]
impl RatingService for MemoryStore {
    async fn update_ratings(
        &self,
        one: &Participant,
        two: &Participant,
        winner: Option<Side>,
    ) -> Result<(f64, f64), StoreError> {
        let mut inner = self.inner.lock();
        Self::check(&inner)?;
        let r1 = inner.ratings.get(&one.id).copied().unwrap_or(INITIAL_RATING);
        let r2 = inner.ratings.get(&two.id).copied().unwrap_or(INITIAL_RATING);
        let expected = 1.0 / (1.0 + 10f64.powf((r2 - r1) / 400.0));
        let score = match winner {
            Some(Side::One) => 1.0,
            Some(Side::Two) => 0.0,
            None => 0.5,
        };
        let delta = RATING_K * (score - expected);
        let (n1, n2) = (r1 + delta, r2 - delta);
        inner.ratings.insert(one.id, n1);
        inner.ratings.insert(two.id, n2);
        Ok((n1, n2))
    }
}

#[cfg(test)]
mod tests {
    use lockstep_race::RaceInfo;

    use super::*;

    fn new_match() -> Match {
        Match::new(
            Participant::new(UserId(1), "alpha"),
            Participant::new(UserId(2), "beta"),
            RaceInfo::default(),
        )
    }

    #[tokio::test]
    async fn test_commit_assigns_id_once() {
        let store = MemoryStore::new();
        let mut m = new_match();
        let id = store.commit_match(&m).await.unwrap();
        m.set_id(id);
        assert_eq!(store.commit_match(&m).await.unwrap(), id);
        let other = store.commit_match(&new_match()).await.unwrap();
        assert_ne!(other, id);
    }

    #[tokio::test]
    async fn test_contest_marks_last_finished_race() {
        let store = MemoryStore::new();
        let id = store.commit_match(&new_match()).await.unwrap();
        assert!(!store.set_last_race_contested(id).await.unwrap());

        for (n, canceled) in [(1, false), (2, true)] {
            store
                .record_match_race(MatchRaceRecord {
                    match_id: id,
                    race_number: n,
                    race_id: None,
                    winner: None,
                    canceled,
                    contested: false,
                })
                .await
                .unwrap();
        }
        assert!(store.set_last_race_contested(id).await.unwrap());
        let races = store.match_races(id);
        assert!(races[0].contested);
        assert!(!races[1].contested);
    }

    #[tokio::test]
    async fn test_failing_store_rejects_writes() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let err = store.commit_match(&new_match()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_elo_is_zero_sum() {
        let store = MemoryStore::new();
        let (a, b) = (Participant::new(UserId(1), "a"), Participant::new(UserId(2), "b"));
        let (n1, n2) = store.update_ratings(&a, &b, Some(Side::One)).await.unwrap();
        assert!(n1 > INITIAL_RATING);
        assert!((n1 + n2 - 2.0 * INITIAL_RATING).abs() < 1e-9);
        assert_eq!(store.rating(UserId(2)), n2);
    }
}
