//! Per-race participant state.
//!
//! Every transition returns whether it changed anything. A `false` is a
//! silent no-op, not an error: the race decides whether it deserves a
//! message.

use lockstep_protocol::{Participant, RaceTime};
use serde::{Deserialize, Serialize};

/// Comments longer than this are cut.
pub const MAX_COMMENT_LEN: usize = 255;

/// A racer's sub-state within one race.
///
/// ```text
/// NotReady ⇄ Ready → Racing ⇄ Finished
///                      ⇅         ↓
///                    Forfeit ←───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RacerState {
    NotReady,
    Ready,
    Racing,
    Forfeit,
    Finished,
}

impl RacerState {
    /// Finished or forfeit: this racer no longer holds the race open.
    pub fn is_done(self) -> bool {
        matches!(self, Self::Forfeit | Self::Finished)
    }
}

/// How far a run got. Finishing marks a win; a forfeit may record where
/// the runner died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Level {
    #[default]
    Unknown,
    Win,
    Reached(u32),
}

/// One participant's state and result in a race.
#[derive(Debug, Clone)]
pub struct Racer {
    participant: Participant,
    state: RacerState,
    time: Option<RaceTime>,
    igt: Option<RaceTime>,
    level: Level,
    comment: Option<String>,
}

impl Racer {
    pub fn new(participant: Participant) -> Self {
        Self {
            participant,
            state: RacerState::NotReady,
            time: None,
            igt: None,
            level: Level::Unknown,
            comment: None,
        }
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn name(&self) -> &str {
        &self.participant.name
    }

    pub fn state(&self) -> RacerState {
        self.state
    }

    /// Recorded time; only meaningful once [`RacerState::is_done`].
    pub fn time(&self) -> Option<RaceTime> {
        self.time
    }

    pub fn igt(&self) -> Option<RaceTime> {
        self.igt
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn is_ready(&self) -> bool {
        self.state == RacerState::Ready
    }

    pub fn is_racing(&self) -> bool {
        self.state == RacerState::Racing
    }

    pub fn is_finished(&self) -> bool {
        self.state == RacerState::Finished
    }

    pub fn is_forfeit(&self) -> bool {
        self.state == RacerState::Forfeit
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    pub fn ready(&mut self) -> bool {
        self.step(RacerState::NotReady, RacerState::Ready)
    }

    pub fn unready(&mut self) -> bool {
        self.step(RacerState::Ready, RacerState::NotReady)
    }

    /// Only the race calls this, once the whole field is ready.
    pub fn begin_race(&mut self) -> bool {
        self.step(RacerState::Ready, RacerState::Racing)
    }

    pub fn finish(&mut self, time: RaceTime) -> bool {
        if !self.step(RacerState::Racing, RacerState::Finished) {
            return false;
        }
        self.time = Some(time);
        self.level = Level::Win;
        true
    }

    pub fn unfinish(&mut self) -> bool {
        if !self.step(RacerState::Finished, RacerState::Racing) {
            return false;
        }
        self.clear_result();
        true
    }

    /// Allowed from `Racing` and from `Finished` (a finished runner can
    /// still withdraw before the results are recorded).
    pub fn forfeit(&mut self, time: RaceTime) -> bool {
        if !matches!(self.state, RacerState::Racing | RacerState::Finished) {
            return false;
        }
        self.state = RacerState::Forfeit;
        self.time = Some(time);
        self.igt = None;
        if self.level == Level::Win {
            self.level = Level::Unknown;
        }
        true
    }

    pub fn unforfeit(&mut self) -> bool {
        if !self.step(RacerState::Forfeit, RacerState::Racing) {
            return false;
        }
        self.clear_result();
        true
    }

    /// Valid once racing has begun. Truncates to [`MAX_COMMENT_LEN`]
    /// characters; never changes state.
    pub fn add_comment(&mut self, text: &str) -> bool {
        if matches!(self.state, RacerState::NotReady | RacerState::Ready) {
            return false;
        }
        self.comment = Some(text.trim().chars().take(MAX_COMMENT_LEN).collect());
        true
    }

    /// In-game time, for finished racers.
    pub fn set_igt(&mut self, igt: RaceTime) -> bool {
        if self.state != RacerState::Finished {
            return false;
        }
        self.igt = Some(igt);
        true
    }

    /// Where a forfeiting runner stopped.
    pub fn set_level(&mut self, level: Level) -> bool {
        if self.state != RacerState::Forfeit {
            return false;
        }
        self.level = level;
        true
    }

    fn step(&mut self, from: RacerState, to: RacerState) -> bool {
        if self.state != from {
            return false;
        }
        self.state = to;
        true
    }

    fn clear_result(&mut self) {
        self.time = None;
        self.igt = None;
        self.level = Level::Unknown;
    }
}

#[cfg(test)]
mod tests {
    use lockstep_protocol::UserId;

    use super::*;

    fn racer() -> Racer {
        Racer::new(Participant::new(UserId(1), "necrodancer"))
    }

    fn racing() -> Racer {
        let mut r = racer();
        r.ready();
        r.begin_race();
        r
    }

    fn t(h: u32) -> RaceTime {
        RaceTime::from_hundredths(h)
    }

    #[test]
    fn test_ready_unready_round_trip() {
        let mut r = racer();
        assert!(r.ready());
        assert!(!r.ready(), "second ready is a no-op");
        assert!(r.unready());
        assert_eq!(r.state(), RacerState::NotReady);
    }

    #[test]
    fn test_begin_race_requires_ready() {
        let mut r = racer();
        assert!(!r.begin_race());
        r.ready();
        assert!(r.begin_race());
        assert!(r.is_racing());
    }

    #[test]
    fn test_finish_records_time_and_win() {
        let mut r = racing();
        assert!(r.finish(t(8_345)));
        assert_eq!(r.time(), Some(t(8_345)));
        assert_eq!(r.level(), Level::Win);
        assert!(!r.finish(t(1)), "cannot finish twice");
    }

    #[test]
    fn test_unfinish_clears_result() {
        let mut r = racing();
        r.finish(t(100));
        r.set_igt(t(90));
        assert!(r.unfinish());
        assert!(r.is_racing());
        assert_eq!(r.time(), None);
        assert_eq!(r.igt(), None);
        assert_eq!(r.level(), Level::Unknown);
    }

    #[test]
    fn test_forfeit_from_racing_and_finished() {
        let mut r = racing();
        assert!(r.forfeit(t(500)));
        assert!(r.is_forfeit());

        let mut f = racing();
        f.finish(t(100));
        f.set_igt(t(95));
        assert!(f.forfeit(t(200)));
        assert_eq!(f.time(), Some(t(200)));
        assert_eq!(f.igt(), None, "forfeit clears in-game time");
    }

    #[test]
    fn test_forfeit_rejected_before_race() {
        let mut r = racer();
        assert!(!r.forfeit(t(1)));
        r.ready();
        assert!(!r.forfeit(t(1)));
    }

    #[test]
    fn test_unforfeit_returns_to_racing() {
        let mut r = racing();
        r.forfeit(t(10));
        r.set_level(Level::Reached(7));
        assert!(r.unforfeit());
        assert!(r.is_racing());
        assert_eq!(r.time(), None);
        assert_eq!(r.level(), Level::Unknown);
        assert!(!r.unforfeit());
    }

    #[test]
    fn test_comment_requires_racing_and_truncates() {
        let mut r = racer();
        assert!(!r.add_comment("too early"));

        let mut r = racing();
        let long = "x".repeat(MAX_COMMENT_LEN + 40);
        assert!(r.add_comment(&long));
        assert_eq!(r.comment().unwrap().chars().count(), MAX_COMMENT_LEN);
        assert!(r.is_racing(), "comment never changes state");
    }

    #[test]
    fn test_igt_and_level_gated_by_state() {
        let mut r = racing();
        assert!(!r.set_igt(t(1)));
        assert!(!r.set_level(Level::Reached(3)));
        r.forfeit(t(1));
        assert!(r.set_level(Level::Reached(3)));
        assert!(!r.set_igt(t(1)));
    }
}
