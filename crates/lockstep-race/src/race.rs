//! The single-race state machine.
//!
//! A `Race` is owned by exactly one race room actor (see `room.rs`). Every
//! public operation runs to completion without awaiting, so the actor
//! applies commands and timer steps strictly one at a time. Delays are
//! [`Timer`]s that post [`TimerFired`] messages back to the actor; the
//! race keeps its single outstanding timer in a [`TimerSlot`], which is
//! what makes "at most one of countdown/finalize" hold by construction.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lockstep_protocol::{Participant, RaceId, RaceTime, UserId};
use lockstep_timer::{Stopwatch, Timer, TimerId, TimerSlot};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{Level, RaceConfig, RaceEvent, RaceInfo, RaceResult, RaceStatus, Racer, RacerState, RoomEventSink};

/// Counter for generating process-local race keys.
static NEXT_RACE_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-local identity of a live race, used in logs and errors. The
/// durable [`RaceId`] only exists once the race has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RaceKey(u64);

impl RaceKey {
    pub(crate) fn next() -> Self {
        Self(NEXT_RACE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "race-{}", self.0)
    }
}

/// Which delay currently occupies the race's timer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceTimer {
    Countdown,
    Unpause,
    Finalize,
}

/// One scheduled step of a race timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerStep {
    /// "Begins in N seconds."
    Announce(u64),
    /// Per-second tick near the end of a countdown.
    Tick(u64),
    /// The delay is over; apply its effect.
    Fire,
}

/// A timer step delivered to the owning actor.
#[derive(Debug)]
pub(crate) struct TimerFired {
    pub(crate) id: TimerId,
    pub(crate) step: TimerStep,
}

/// Every command a race room understands.
///
/// A closed set: the room matches it exhaustively, and anything the
/// current state does not allow comes back as `false`.
#[derive(Debug, Clone)]
pub enum RaceAction {
    Enter(Participant),
    EnterAndReady(Participant),
    /// Enter without an announcement. Used when a match seats its racers.
    AutoEnter(Participant),
    Unenter(UserId),
    Ready(UserId),
    Unready(UserId),
    Finish(UserId),
    Unfinish(UserId),
    Forfeit(UserId),
    Unforfeit(UserId),
    /// Admin override: forfeit somebody else.
    ForceForfeit(UserId),
    Comment(UserId, String),
    SetIgt(UserId, RaceTime),
    SetLevel(UserId, Level),
    Pause,
    Unpause,
    /// Extend the finalize window by one more period.
    DelayRecord,
    /// Ready everyone and start the countdown.
    ForceBegin,
    CancelCountdown,
    CancelFinalization,
    Cancel,
}

/// Read-only view of a race, answered by the room on request.
#[derive(Debug, Clone)]
pub struct RaceSnapshot {
    pub key: RaceKey,
    pub status: RaceStatus,
    pub entrants: usize,
    /// Time since the entrant list was last empty. Meaningful only while
    /// `entrants == 0`.
    pub since_last_empty: Duration,
    pub elapsed: Duration,
    pub armed_timer: Option<RaceTimer>,
    pub seed: Option<u32>,
    pub delay_record: bool,
}

impl RaceSnapshot {
    pub fn has_any_entrants(&self) -> bool {
        self.entrants > 0
    }
}

pub(crate) struct Race {
    key: RaceKey,
    config: RaceConfig,
    info: RaceInfo,
    seed: Option<u32>,
    status: RaceStatus,
    /// Entry order is insertion order.
    racers: Vec<Racer>,
    stopwatch: Stopwatch,
    started_at: Option<DateTime<Utc>>,
    timer: TimerSlot<RaceTimer>,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
    delay_record: bool,
    last_empty: Instant,
    sink: Arc<dyn RoomEventSink>,
}

impl Race {
    pub(crate) fn new(
        config: RaceConfig,
        info: RaceInfo,
        sink: Arc<dyn RoomEventSink>,
        timer_tx: mpsc::UnboundedSender<TimerFired>,
    ) -> Self {
        let seed = info.roll_seed();
        Self {
            key: RaceKey::next(),
            config,
            info,
            seed,
            status: RaceStatus::Uninitialized,
            racers: Vec::new(),
            stopwatch: Stopwatch::new(),
            started_at: None,
            timer: TimerSlot::new(),
            timer_tx,
            delay_record: false,
            last_empty: Instant::now(),
            sink,
        }
    }

    pub(crate) fn key(&self) -> RaceKey {
        self.key
    }

    pub(crate) fn status(&self) -> RaceStatus {
        self.status
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.stopwatch.elapsed()
    }

    pub(crate) fn armed_timer(&self) -> Option<RaceTimer> {
        self.timer.kind()
    }

    #[cfg(test)]
    pub(crate) fn has_any_entrants(&self) -> bool {
        !self.racers.is_empty()
    }

    pub(crate) fn time_since_last_empty(&self) -> Duration {
        self.last_empty.elapsed()
    }

    #[cfg(test)]
    pub(crate) fn racer(&self, user: UserId) -> Option<&Racer> {
        self.racers.iter().find(|r| r.participant().id == user)
    }

    pub(crate) fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            key: self.key,
            status: self.status,
            entrants: self.racers.len(),
            since_last_empty: self.time_since_last_empty(),
            elapsed: self.elapsed(),
            armed_timer: self.armed_timer(),
            seed: self.seed,
            delay_record: self.delay_record,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Uninitialized → EntryOpen. Starts the no-entrants clock.
    pub(crate) fn initialize(&mut self) -> bool {
        if !self.set_status(RaceStatus::EntryOpen) {
            return false;
        }
        self.last_empty = Instant::now();
        info!(race = %self.key, description = %self.info.description, "race entry open");
        self.refresh();
        true
    }

    /// Applies one command. Terminal races ignore everything.
    pub(crate) fn apply(&mut self, action: RaceAction) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        let changed = match action {
            RaceAction::Enter(p) => self.enter(p, false, true),
            RaceAction::EnterAndReady(p) => self.enter(p, true, true),
            RaceAction::AutoEnter(p) => self.enter(p, false, false),
            RaceAction::Unenter(user) => self.unenter(user),
            RaceAction::Ready(user) => self.ready(user),
            RaceAction::Unready(user) => self.unready(user),
            RaceAction::Finish(user) => self.finish(user),
            RaceAction::Unfinish(user) => self.unfinish(user),
            RaceAction::Forfeit(user) => self.forfeit(user, false),
            RaceAction::ForceForfeit(user) => self.forfeit(user, true),
            RaceAction::Unforfeit(user) => self.unforfeit(user),
            RaceAction::Comment(user, text) => self.with_result_racer(user, |r| r.add_comment(&text)),
            RaceAction::SetIgt(user, igt) => self.with_result_racer(user, |r| r.set_igt(igt)),
            RaceAction::SetLevel(user, level) => self.with_result_racer(user, |r| r.set_level(level)),
            RaceAction::Pause => self.pause(),
            RaceAction::Unpause => self.unpause(),
            RaceAction::DelayRecord => self.delay_record(),
            RaceAction::ForceBegin => self.force_begin(),
            RaceAction::CancelCountdown => self.cancel_countdown(),
            RaceAction::CancelFinalization => self.restart_finalization(),
            RaceAction::Cancel => self.cancel(),
        };
        if changed {
            self.refresh();
        }
        changed
    }

    /// Handles a timer step. Returns the result set when the race has just
    /// finalized; the room persists it and then calls
    /// [`publish_result`](Self::publish_result).
    pub(crate) fn on_timer(&mut self, fired: TimerFired) -> Option<RaceResult> {
        let Some(kind) = self.timer.accepts(fired.id) else {
            debug!(race = %self.key, timer = %fired.id, "stale timer step ignored");
            return None;
        };
        match fired.step {
            TimerStep::Announce(secs) => {
                match kind {
                    RaceTimer::Countdown => {
                        self.sink.write(&format!("The race will begin in {secs} seconds."))
                    }
                    RaceTimer::Unpause => self.sink.write(&format!("Unpausing in {secs} seconds.")),
                    RaceTimer::Finalize => {}
                }
                None
            }
            TimerStep::Tick(remaining) => {
                self.sink.write(&remaining.to_string());
                None
            }
            TimerStep::Fire => {
                self.timer.complete(fired.id);
                match kind {
                    RaceTimer::Countdown => {
                        self.begin_race();
                        None
                    }
                    RaceTimer::Unpause => {
                        self.resume();
                        None
                    }
                    RaceTimer::Finalize => self.finalize(),
                }
            }
        }
    }

    /// Announces a finalized result to the room.
    pub(crate) fn publish_result(&self, result: RaceResult, race_id: Option<RaceId>) {
        self.sink.post_result(&result.render());
        self.sink.race_event(&RaceEvent::Finalize { result, race_id });
    }

    // -----------------------------------------------------------------------
    // Entry
    // -----------------------------------------------------------------------

    fn enter(&mut self, participant: Participant, ready: bool, announce: bool) -> bool {
        if !self.status.is_pre_race() {
            return false;
        }
        let existing = self.position(participant.id);
        match existing {
            Some(_) if !ready => return false,
            Some(i) if self.racers[i].is_ready() => return false,
            _ => {}
        }
        // A newcomer (or a newly readied racer) invalidates the countdown.
        if self.status == RaceStatus::CountingDown && !self.cancel_countdown() {
            return false;
        }

        let idx = match existing {
            Some(i) => i,
            None => {
                self.racers.push(Racer::new(participant.clone()));
                self.sink.race_event(&RaceEvent::RacerEnter(participant.clone()));
                self.racers.len() - 1
            }
        };
        if ready {
            self.racers[idx].ready();
        }
        info!(race = %self.key, user = %participant.id, ready, "racer entered");

        if announce {
            // Re-entering without readying was rejected above, so a plain
            // entry is always a newcomer.
            let name = &participant.name;
            let text = if ready {
                format!("{name} is ready! {}", self.remaining_text())
            } else {
                format!("{name} has entered the race. {} entrants.", self.racers.len())
            };
            self.sink.write(text.trim_end());
        }

        self.check_for_ready();
        true
    }

    fn unenter(&mut self, user: UserId) -> bool {
        let Some(idx) = self.position(user) else {
            return false;
        };
        if self.status >= RaceStatus::Racing {
            return self.forfeit(user, false);
        }
        if !self.status.is_pre_race() {
            return false;
        }
        if self.status == RaceStatus::CountingDown && !self.cancel_countdown() {
            return false;
        }

        let racer = self.racers.remove(idx);
        self.sink.write(&format!("{} is no longer entered.", racer.name()));
        self.sink
            .race_event(&RaceEvent::RacerUnenter(racer.participant().clone()));
        info!(race = %self.key, %user, "racer unentered");
        if self.racers.is_empty() {
            self.last_empty = Instant::now();
        }
        self.check_for_ready();
        true
    }

    fn ready(&mut self, user: UserId) -> bool {
        if self.status != RaceStatus::EntryOpen {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        if !self.racers[idx].ready() {
            return false;
        }
        let text = format!("{} is ready! {}", self.racers[idx].name(), self.remaining_text());
        self.sink.write(text.trim_end());
        self.check_for_ready();
        true
    }

    fn unready(&mut self, user: UserId) -> bool {
        if !self.status.is_pre_race() {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        if !self.racers[idx].is_ready() {
            return false;
        }
        if self.status == RaceStatus::CountingDown && !self.cancel_countdown() {
            return false;
        }
        self.racers[idx].unready();
        self.sink
            .write(&format!("{} is no longer ready.", self.racers[idx].name()));
        true
    }

    fn force_begin(&mut self) -> bool {
        if self.status != RaceStatus::EntryOpen || self.racers.is_empty() {
            return false;
        }
        for racer in &mut self.racers {
            racer.ready();
        }
        self.sink.write("Forcing the race to begin.");
        self.begin_countdown()
    }

    fn all_ready(&self) -> bool {
        !self.racers.is_empty()
            && self.racers.iter().all(Racer::is_ready)
            && (!self.config.require_at_least_two || self.racers.len() >= 2)
    }

    fn check_for_ready(&mut self) {
        if self.status == RaceStatus::EntryOpen && self.all_ready() {
            self.begin_countdown();
        }
    }

    fn remaining_text(&self) -> String {
        let remaining = self.racers.iter().filter(|r| !r.is_ready()).count();
        if remaining == 0 {
            String::new()
        } else {
            format!("{remaining} remaining.")
        }
    }

    // -----------------------------------------------------------------------
    // Countdown and start
    // -----------------------------------------------------------------------

    fn begin_countdown(&mut self) -> bool {
        if !self.set_status(RaceStatus::CountingDown) {
            return false;
        }
        let steps = countdown_steps(self.config.countdown, self.config.incremental_countdown_start);
        self.arm(RaceTimer::Countdown, steps);
        info!(race = %self.key, countdown = ?self.config.countdown, "countdown started");
        true
    }

    /// CountingDown → EntryOpen, if the countdown has not fired yet.
    fn cancel_countdown(&mut self) -> bool {
        if self.status != RaceStatus::CountingDown || !self.timer.cancel(RaceTimer::Countdown) {
            return false;
        }
        self.set_status(RaceStatus::EntryOpen);
        self.sink.write("Countdown cancelled.");
        info!(race = %self.key, "countdown cancelled");
        true
    }

    fn begin_race(&mut self) {
        if !self.set_status(RaceStatus::Racing) {
            return;
        }
        for racer in &mut self.racers {
            racer.begin_race();
        }
        self.stopwatch.start();
        self.started_at = Some(Utc::now());
        self.sink.write("GO!");
        self.sink.race_event(&RaceEvent::Begin);
        info!(race = %self.key, racers = self.racers.len(), "race began");
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Pause
    // -----------------------------------------------------------------------

    fn pause(&mut self) -> bool {
        if self.status != RaceStatus::Racing || !self.set_status(RaceStatus::Paused) {
            return false;
        }
        self.stopwatch.pause();
        self.sink.write("The race is paused.");
        info!(race = %self.key, elapsed = ?self.elapsed(), "race paused");
        true
    }

    fn unpause(&mut self) -> bool {
        // An unpause countdown already running counts as a pending unpause.
        if self.status != RaceStatus::Paused || self.timer.is_armed() {
            return false;
        }
        if self.config.unpause_countdown.is_zero() {
            self.resume();
        } else {
            let steps = countdown_steps(self.config.unpause_countdown, self.config.incremental_countdown_start);
            self.arm(RaceTimer::Unpause, steps);
        }
        true
    }

    fn resume(&mut self) {
        if !self.set_status(RaceStatus::Racing) {
            return;
        }
        self.stopwatch.resume();
        self.sink.write("GO!");
        info!(race = %self.key, elapsed = ?self.elapsed(), "race unpaused");
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    fn finish(&mut self, user: UserId) -> bool {
        if self.status != RaceStatus::Racing {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        let time = self.race_time();
        if !self.racers[idx].finish(time) {
            return false;
        }
        let place = self.racers.iter().filter(|r| r.is_finished()).count();
        self.sink.write(&format!(
            "{} has finished in {} place with a time of {time}.",
            self.racers[idx].name(),
            ordinal(place)
        ));
        info!(race = %self.key, %user, %time, place, "racer finished");
        self.check_for_race_end();
        true
    }

    fn unfinish(&mut self, user: UserId) -> bool {
        if !matches!(self.status, RaceStatus::Racing | RaceStatus::Completed) {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        if !self.racers[idx].is_finished() || !self.reopen_if_completed() {
            return false;
        }
        self.racers[idx].unfinish();
        self.sink
            .write(&format!("{} continues to race!", self.racers[idx].name()));
        info!(race = %self.key, %user, "racer unfinished");
        true
    }

    fn forfeit(&mut self, user: UserId, forced: bool) -> bool {
        if !matches!(
            self.status,
            RaceStatus::Racing | RaceStatus::Paused | RaceStatus::Completed
        ) {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        if !matches!(self.racers[idx].state(), RacerState::Racing | RacerState::Finished)
            || !self.reopen_if_completed()
        {
            return false;
        }
        let time = self.race_time();
        self.racers[idx].forfeit(time);
        let name = self.racers[idx].name();
        if forced {
            self.sink.write(&format!("{name} has been forfeit by an admin."));
        } else {
            self.sink.write(&format!("{name} has forfeit the race."));
        }
        info!(race = %self.key, %user, forced, "racer forfeit");
        self.check_for_race_end();
        true
    }

    fn unforfeit(&mut self, user: UserId) -> bool {
        if !matches!(
            self.status,
            RaceStatus::Racing | RaceStatus::Paused | RaceStatus::Completed
        ) {
            return false;
        }
        let Some(idx) = self.position(user) else {
            return false;
        };
        if !self.racers[idx].is_forfeit() || !self.reopen_if_completed() {
            return false;
        }
        self.racers[idx].unforfeit();
        self.sink.write(&format!(
            "{} is no longer forfeit and continues to race!",
            self.racers[idx].name()
        ));
        info!(race = %self.key, %user, "racer unforfeit");
        true
    }

    /// Comments, in-game times and levels may be edited from the start of
    /// the race until it is recorded.
    fn with_result_racer(&mut self, user: UserId, edit: impl FnOnce(&mut Racer) -> bool) -> bool {
        if !matches!(
            self.status,
            RaceStatus::Racing | RaceStatus::Paused | RaceStatus::Completed
        ) {
            return false;
        }
        match self.position(user) {
            Some(idx) => edit(&mut self.racers[idx]),
            None => false,
        }
    }

    /// A correction during the finalize window first has to win against
    /// the finalize timer.
    fn reopen_if_completed(&mut self) -> bool {
        self.status != RaceStatus::Completed || self.cancel_finalization()
    }

    fn check_for_race_end(&mut self) {
        if !matches!(self.status, RaceStatus::Racing | RaceStatus::Paused) {
            return;
        }

        if self.config.auto_forfeit_last_racer {
            let mut still_racing = self.racers.iter().enumerate().filter(|(_, r)| r.is_racing());
            let last = match (still_racing.next(), still_racing.next()) {
                (Some((idx, _)), None) => Some(idx),
                _ => None,
            };
            let anyone_finished = self.racers.iter().any(Racer::is_finished);
            if let (Some(idx), true) = (last, anyone_finished) {
                let time = self.race_time();
                self.racers[idx].forfeit(time);
                self.sink.write(&format!(
                    "{} has been automatically forfeit.",
                    self.racers[idx].name()
                ));
                info!(race = %self.key, user = %self.racers[idx].participant().id, "last racer auto-forfeit");
            }
        }

        if self.racers.is_empty() || !self.racers.iter().all(Racer::is_done) {
            return;
        }
        if self.status == RaceStatus::Paused {
            self.stopwatch.resume();
        }
        if !self.set_status(RaceStatus::Completed) {
            return;
        }
        self.delay_record = false;
        self.arm(RaceTimer::Finalize, vec![(self.config.finalize_delay, TimerStep::Fire)]);
        self.sink.write(&format!(
            "The race is over. Results will be recorded in {} seconds. Until then, you may \
             comment or add an in-game time.",
            self.config.finalize_delay.as_secs()
        ));
        self.sink.race_event(&RaceEvent::End);
        info!(race = %self.key, "race completed");
    }

    // -----------------------------------------------------------------------
    // Finalization and cancellation
    // -----------------------------------------------------------------------

    fn delay_record(&mut self) -> bool {
        if self.status != RaceStatus::Completed || self.delay_record {
            return false;
        }
        self.delay_record = true;
        self.sink.write(&format!(
            "Delaying recording for an extra {} seconds.",
            self.config.finalize_delay.as_secs()
        ));
        true
    }

    /// Completed → Racing, if the finalize timer has not fired yet.
    fn cancel_finalization(&mut self) -> bool {
        if self.status != RaceStatus::Completed || !self.timer.cancel(RaceTimer::Finalize) {
            return false;
        }
        self.set_status(RaceStatus::Racing);
        self.delay_record = false;
        info!(race = %self.key, "finalization cancelled");
        true
    }

    /// A cancel with no correction behind it leaves every racer done, so
    /// the race completes again and the recording window starts over.
    fn restart_finalization(&mut self) -> bool {
        if !self.cancel_finalization() {
            return false;
        }
        self.check_for_race_end();
        true
    }

    fn finalize(&mut self) -> Option<RaceResult> {
        if self.delay_record {
            self.delay_record = false;
            self.arm(RaceTimer::Finalize, vec![(self.config.finalize_delay, TimerStep::Fire)]);
            debug!(race = %self.key, "finalization delayed by one period");
            return None;
        }
        if !self.set_status(RaceStatus::Finalized) {
            return None;
        }
        let result = RaceResult::from_ordered(
            self.info.clone(),
            self.seed,
            self.started_at,
            &self.ordered_racers(),
        );
        info!(race = %self.key, winner = ?result.winner().map(|p| p.id), "race finalized");
        self.refresh();
        Some(result)
    }

    fn cancel(&mut self) -> bool {
        if !self.set_status(RaceStatus::Cancelled) {
            return false;
        }
        self.timer.cancel_any();
        self.sink.write("The race has been cancelled.");
        self.sink.race_event(&RaceEvent::Cancel);
        info!(race = %self.key, "race cancelled");
        true
    }

    // -----------------------------------------------------------------------
    // Leaderboard
    // -----------------------------------------------------------------------

    /// Racers in display order: finishers by ascending time, then forfeits,
    /// then everyone else. The sort is stable, so ties keep entry order.
    fn ordered_racers(&self) -> Vec<&Racer> {
        let mut ordered: Vec<&Racer> = self.racers.iter().collect();
        ordered.sort_by_key(|r| match r.state() {
            RacerState::Finished => (0, r.time().map_or(u32::MAX, RaceTime::hundredths)),
            RacerState::Forfeit => (1, 0),
            _ => (2, 0),
        });
        ordered
    }

    pub(crate) fn leaderboard_text(&self) -> String {
        let mut text = format!("{} [{}]", self.info.description, self.status);
        if let Some(seed) = self.seed {
            text.push_str(&format!("\nSeed: {seed}"));
        }
        let mut place = 0;
        for racer in self.ordered_racers() {
            text.push('\n');
            let prefix = if racer.is_finished() {
                place += 1;
                format!("{place:>2}.")
            } else {
                "   ".to_string()
            };
            text.push_str(&format!("{prefix} {} --- {}", racer.name(), status_text(racer)));
            if let Some(comment) = racer.comment() {
                text.push_str(&format!(" -- {comment}"));
            }
        }
        text
    }

    fn refresh(&self) {
        self.sink.update_leaderboard(&self.leaderboard_text());
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn position(&self, user: UserId) -> Option<usize> {
        self.racers.iter().position(|r| r.participant().id == user)
    }

    fn race_time(&self) -> RaceTime {
        RaceTime::from_duration(self.stopwatch.elapsed())
    }

    fn arm(&mut self, kind: RaceTimer, steps: Vec<(Duration, TimerStep)>) {
        let timer = Timer::spawn(steps, self.timer_tx.clone(), |id, step| TimerFired { id, step });
        self.timer.arm(kind, timer);
    }

    fn set_status(&mut self, target: RaceStatus) -> bool {
        if !self.status.can_transition_to(target) {
            warn!(race = %self.key, from = %self.status, to = %target, "rejected status transition");
            return false;
        }
        debug!(race = %self.key, from = %self.status, to = %target, "status transition");
        self.status = target;
        true
    }
}

/// Announce at the start, tick the final seconds, fire at the end.
fn countdown_steps(length: Duration, incremental_start: u32) -> Vec<(Duration, TimerStep)> {
    let secs = length.as_secs();
    let mut steps = Vec::new();
    if secs > 0 {
        steps.push((Duration::ZERO, TimerStep::Announce(secs)));
    }
    for remaining in (1..=u64::from(incremental_start)).rev() {
        if remaining < secs {
            steps.push((length - Duration::from_secs(remaining), TimerStep::Tick(remaining)));
        }
    }
    steps.push((length, TimerStep::Fire));
    steps
}

fn status_text(racer: &Racer) -> String {
    match racer.state() {
        RacerState::NotReady => "Not ready".to_string(),
        RacerState::Ready => "Ready".to_string(),
        RacerState::Racing => "Racing".to_string(),
        RacerState::Finished => {
            let mut text = racer.time().map(|t| t.to_string()).unwrap_or_default();
            if let Some(igt) = racer.igt() {
                text.push_str(&format!(" (igt {igt})"));
            }
            text
        }
        RacerState::Forfeit => match racer.level() {
            Level::Reached(level) => format!("Forfeit (reached {level})"),
            _ => "Forfeit".to_string(),
        },
    }
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

// =========================================================================
// Tests
// =========================================================================
