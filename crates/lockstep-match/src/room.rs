//! Match room actor: sequences the races of one match.
//!
//! The actor owns the [`Match`], the start-time alarm, and the handle of
//! the race currently being run. Races report back through a wrapper sink
//! that tags each event with the race's generation, so events from a race
//! the room has already moved past are dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lockstep_protocol::{MatchId, Participant, RaceId, Side, UserId};
use lockstep_race::{
    RaceAction, RaceConfig, RaceEvent, RaceHandle, RaceResult, RaceSnapshot, RaceStatus, RaceStore,
    RoomEventSink, spawn_race,
};
use lockstep_timer::{Timer, TimerId, TimerSlot};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::alarm::{self, AlarmPlan, AlarmStep};
use crate::{Match, MatchError, MatchRaceRecord, MatchRaceTally, MatchStore, RatingService, Unconfirm};

const DEFAULT_CHANNEL_SIZE: usize = 64;
const EVENT_CHANNEL_SIZE: usize = 64;

/// Settings shared by every match room of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRoomConfig {
    /// Base race timings. Match races always run with
    /// [`RaceConfig::for_match`] applied.
    pub race: RaceConfig,
    /// Lead time of the "racers notified" warning.
    pub first_warning: Duration,
    /// Lead time of the final warning.
    pub final_warning: Duration,
    /// Also announce the final warning outside the room.
    pub public_alerts: bool,
}

impl Default for MatchRoomConfig {
    fn default() -> Self {
        Self {
            race: RaceConfig::default(),
            first_warning: Duration::from_secs(15 * 60),
            final_warning: Duration::from_secs(5 * 60),
            public_alerts: true,
        }
    }
}

/// Notifications a match room broadcasts to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    RaceOpened { number: u32, seed: Option<u32> },
    RaceRecorded { number: u32, race_id: RaceId, winner: Option<Side> },
    RaceCanceled { number: u32 },
    Complete { wins: [u32; 2] },
}

/// Every command a match room understands.
#[derive(Debug, Clone)]
pub enum MatchAction {
    SuggestTime(DateTime<Utc>),
    Confirm(Side),
    Unconfirm(Side),
    ForceConfirm,
    ForceUnconfirm,
    SetBestOf(u32),
    SetRepeat(u32),
    SetRanked(bool),
    SetCawmentator(Option<Participant>),
    /// Admin: open the next race now, or start the open one's countdown.
    ForceBeginRace,
    /// Admin: cancel the current race and record it as canceled.
    CancelRace,
    /// Admin: throw the current race away and run it again.
    Remake,
    /// Admin: flag the last recorded race as contested.
    ContestLastRace,
    /// Forwarded to the current race.
    Race(RaceAction),
}

/// Read-only view of a match room.
#[derive(Debug, Clone)]
pub struct MatchSnapshot {
    pub state: Match,
    /// Number and state of the current race.
    pub race: Option<(u32, RaceSnapshot)>,
    pub alarm_armed: bool,
    pub complete: bool,
}

pub(crate) enum MatchCommand {
    Act {
        action: MatchAction,
        reply: oneshot::Sender<Result<bool, MatchError>>,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Shutdown,
}

/// Handle to a running match room. Cheap to clone.
#[derive(Clone)]
pub struct MatchHandle {
    match_id: MatchId,
    sender: mpsc::Sender<MatchCommand>,
    events: broadcast::Sender<MatchEvent>,
}

impl MatchHandle {
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Applies `action`. `Ok(false)` means nothing changed.
    pub async fn act(&self, action: MatchAction) -> Result<bool, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(MatchCommand::Act {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))?;
        reply_rx
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))?
    }

    pub async fn snapshot(&self) -> Result<MatchSnapshot, MatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(MatchCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))?;
        reply_rx
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))
    }

    /// Receives every event broadcast after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), MatchError> {
        self.sender
            .send(MatchCommand::Shutdown)
            .await
            .map_err(|_| MatchError::Unavailable(self.match_id))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Race plumbing
// ---------------------------------------------------------------------------

/// Forwards a race's room traffic to the match room's sink and its
/// lifecycle events back to the match actor.
struct MatchRaceSink {
    room: Arc<dyn RoomEventSink>,
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, RaceEvent)>,
}

impl RoomEventSink for MatchRaceSink {
    fn write(&self, text: &str) {
        self.room.write(text);
    }

    fn update_leaderboard(&self, text: &str) {
        self.room.update_leaderboard(text);
    }

    fn notify(&self, user: UserId) {
        self.room.notify(user);
    }

    fn dont_notify(&self, user: UserId) {
        self.room.dont_notify(user);
    }

    fn post_result(&self, text: &str) {
        self.room.post_result(text);
    }

    fn alert(&self, text: &str) {
        self.room.alert(text);
    }

    fn close(&self) {
        self.room.close();
    }

    fn race_event(&self, event: &RaceEvent) {
        self.room.race_event(event);
        let _ = self.tx.send((self.generation, event.clone()));
    }
}

struct ActiveRace {
    number: u32,
    generation: u64,
    handle: RaceHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTimer {
    StartAlarm,
}

#[derive(Debug)]
struct AlarmFired {
    id: TimerId,
    step: AlarmStep,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct MatchActor {
    match_id: MatchId,
    state: Match,
    config: MatchRoomConfig,
    sink: Arc<dyn RoomEventSink>,
    store: Arc<dyn MatchStore>,
    ratings: Arc<dyn RatingService>,
    receiver: mpsc::Receiver<MatchCommand>,
    alarm: TimerSlot<MatchTimer>,
    alarm_tx: mpsc::UnboundedSender<AlarmFired>,
    alarm_rx: mpsc::UnboundedReceiver<AlarmFired>,
    race: Option<ActiveRace>,
    generation: u64,
    race_tx: mpsc::UnboundedSender<(u64, RaceEvent)>,
    race_rx: mpsc::UnboundedReceiver<(u64, RaceEvent)>,
    events: broadcast::Sender<MatchEvent>,
    complete: bool,
}

impl MatchActor {
    async fn run(mut self) {
        info!(match_id = %self.match_id, "match actor started");
        self.initialize().await;

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                Some(fired) = self.alarm_rx.recv() => self.on_alarm(fired).await,
                Some((generation, event)) = self.race_rx.recv() => {
                    self.on_race_event(generation, event).await;
                }
            }
        }

        self.retire_race().await;
        info!(match_id = %self.match_id, "match actor stopped");
    }

    /// Picks up where a (possibly restarted) match left off.
    async fn initialize(&mut self) {
        let tally = match self.store.match_race_tally(self.match_id).await {
            Ok(tally) => tally,
            Err(e) => {
                error!(match_id = %self.match_id, error = %e, "could not load match races");
                self.sink
                    .write("Error: could not load this match's races. The match will not start on its own.");
                return;
            }
        };
        if self.state.is_complete(&tally) {
            self.complete = true;
            return;
        }
        let (true, Some(time)) = (self.state.is_scheduled(), self.state.suggested_time()) else {
            debug!(match_id = %self.match_id, "match not scheduled, idle");
            return;
        };

        let plan = self.plan(time);
        if plan.overdue {
            warn!(match_id = %self.match_id, scheduled = %time, "match start time passed while offline");
            self.sink.write(&format!(
                "Warning: this match was scheduled to start at {} and the start was missed. \
                 Starting the next race now.",
                time.format("%Y-%m-%d %H:%M UTC")
            ));
            if let Err(e) = self.begin_next_race().await {
                error!(match_id = %self.match_id, error = %e, "could not open recovered race");
            }
        } else {
            self.arm_alarm(plan);
        }
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, cmd: MatchCommand) -> bool {
        match cmd {
            MatchCommand::Act { action, reply } => {
                let result = self.apply(action).await;
                let _ = reply.send(result);
            }
            MatchCommand::Snapshot { reply } => {
                let race = match &self.race {
                    Some(race) => race.handle.snapshot().await.ok().map(|s| (race.number, s)),
                    None => None,
                };
                let _ = reply.send(MatchSnapshot {
                    state: self.state.clone(),
                    race,
                    alarm_armed: self.alarm.is_armed(),
                    complete: self.complete,
                });
            }
            MatchCommand::Shutdown => {
                info!(match_id = %self.match_id, "match room shutting down");
                return false;
            }
        }
        true
    }

    async fn apply(&mut self, action: MatchAction) -> Result<bool, MatchError> {
        match action {
            MatchAction::SuggestTime(time) => {
                self.state.suggest_time(time);
                self.sink.write(&format!(
                    "Suggested start time: {}. Both racers must confirm.",
                    time.format("%Y-%m-%d %H:%M UTC")
                ));
                self.schedule_changed(true).await
            }
            MatchAction::Confirm(side) => {
                let changed = self.state.confirm(side);
                if changed {
                    let name = self.state.participant(side).name.clone();
                    match self.state.suggested_time() {
                        Some(time) if self.state.is_scheduled() => self.sink.write(&format!(
                            "{name} confirmed. The match is scheduled for {}.",
                            time.format("%Y-%m-%d %H:%M UTC")
                        )),
                        _ => self.sink.write(&format!("{name} confirmed the suggested time.")),
                    }
                }
                self.schedule_changed(changed).await
            }
            MatchAction::Unconfirm(side) => {
                let outcome = self.state.unconfirm(side);
                match outcome {
                    Unconfirm::Cleared => self.sink.write("The suggested time has been cleared."),
                    Unconfirm::Requested => self.sink.write(&format!(
                        "{} wishes to unconfirm. The other racer must also unconfirm.",
                        self.state.participant(side)
                    )),
                    Unconfirm::Unchanged => {}
                }
                match outcome {
                    Unconfirm::Cleared => self.schedule_changed(true).await,
                    // Still scheduled; the running alarm chain stays as is.
                    Unconfirm::Requested => self.settings_changed(true).await,
                    Unconfirm::Unchanged => Ok(false),
                }
            }
            MatchAction::ForceConfirm => {
                let changed = self.state.force_confirm();
                self.schedule_changed(changed).await
            }
            MatchAction::ForceUnconfirm => {
                let changed = self.state.force_unconfirm();
                self.schedule_changed(changed).await
            }
            MatchAction::SetBestOf(n) => {
                let changed = self.state.set_best_of(n);
                self.settings_changed(changed).await
            }
            MatchAction::SetRepeat(n) => {
                let changed = self.state.set_repeat(n);
                self.settings_changed(changed).await
            }
            MatchAction::SetRanked(ranked) => {
                let changed = self.state.set_ranked(ranked);
                self.settings_changed(changed).await
            }
            MatchAction::SetCawmentator(cawmentator) => {
                let changed = self.state.set_cawmentator(cawmentator);
                self.settings_changed(changed).await
            }
            MatchAction::ForceBeginRace => self.force_begin_race().await,
            MatchAction::CancelRace => self.cancel_race(true).await,
            MatchAction::Remake => self.cancel_race(false).await,
            MatchAction::ContestLastRace => {
                let contested = self.store.set_last_race_contested(self.match_id).await?;
                if contested {
                    self.sink.write("The last race has been marked as contested.");
                }
                Ok(contested)
            }
            MatchAction::Race(action) => match &self.race {
                Some(race) => Ok(race.handle.act(action).await?),
                None => Ok(false),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    async fn schedule_changed(&mut self, changed: bool) -> Result<bool, MatchError> {
        if !changed {
            return Ok(false);
        }
        self.reschedule();
        self.commit().await?;
        Ok(true)
    }

    async fn settings_changed(&mut self, changed: bool) -> Result<bool, MatchError> {
        if changed {
            self.commit().await?;
        }
        Ok(changed)
    }

    /// Drops any armed alarm and, if the match is still waiting on its
    /// start time, arms a fresh chain for the current schedule.
    fn reschedule(&mut self) {
        let had_alarm = self.alarm.cancel_any().is_some();
        if self.complete || self.race.is_some() {
            return;
        }
        match (self.state.is_scheduled(), self.state.suggested_time()) {
            (true, Some(time)) => {
                let plan = self.plan(time);
                self.arm_alarm(plan);
            }
            _ if had_alarm => info!(match_id = %self.match_id, "start alarm cancelled"),
            _ => {}
        }
    }

    fn plan(&self, time: DateTime<Utc>) -> AlarmPlan {
        alarm::plan(
            Utc::now(),
            time,
            self.config.first_warning,
            self.config.final_warning,
        )
    }

    fn arm_alarm(&mut self, plan: AlarmPlan) {
        info!(match_id = %self.match_id, steps = plan.steps.len(), overdue = plan.overdue, "start alarm armed");
        let timer = Timer::spawn(plan.steps, self.alarm_tx.clone(), |id, step| AlarmFired { id, step });
        self.alarm.arm(MatchTimer::StartAlarm, timer);
    }

    async fn on_alarm(&mut self, fired: AlarmFired) {
        if self.alarm.accepts(fired.id).is_none() {
            debug!(match_id = %self.match_id, timer = %fired.id, "stale alarm step ignored");
            return;
        }
        let one = self.state.participant(Side::One).clone();
        let two = self.state.participant(Side::Two).clone();
        let minutes = self.minutes_to_start();
        match fired.step {
            AlarmStep::FirstWarning => {
                info!(match_id = %self.match_id, "racers notified");
                self.sink.notify(one.id);
                self.sink.notify(two.id);
                self.sink
                    .write(&format!("{one}, {two}: your match begins in {minutes} minutes."));
            }
            AlarmStep::FinalWarning => {
                info!(match_id = %self.match_id, "final match warning");
                self.sink
                    .write(&format!("The match begins in {minutes} minutes."));
                if self.config.public_alerts {
                    self.sink
                        .alert(&format!("{one} v {two} begins in {minutes} minutes."));
                }
            }
            AlarmStep::Begin => {
                self.alarm.complete(fired.id);
                if let Err(e) = self.begin_next_race().await {
                    error!(match_id = %self.match_id, error = %e, "could not open scheduled race");
                }
            }
        }
    }

    fn minutes_to_start(&self) -> i64 {
        self.state
            .suggested_time()
            .map_or(0, |time| ((time - Utc::now()).num_seconds().max(0) + 59) / 60)
    }

    // -----------------------------------------------------------------------
    // Races
    // -----------------------------------------------------------------------

    /// Opens the next race of the match, or completes the match if the
    /// recorded races already decide it. `Ok(false)` when a race is
    /// still running or the match is over.
    async fn begin_next_race(&mut self) -> Result<bool, MatchError> {
        if self.complete || self.race_in_progress().await {
            return Ok(false);
        }
        let tally = self.store.match_race_tally(self.match_id).await?;
        if self.state.is_complete(&tally) {
            self.finish_match(tally).await;
            return Ok(false);
        }

        self.alarm.cancel_any();
        self.retire_race().await;
        self.generation += 1;
        let number = tally.next_race_number();
        let sink = Arc::new(MatchRaceSink {
            room: Arc::clone(&self.sink),
            generation: self.generation,
            tx: self.race_tx.clone(),
        });
        let race_store: Arc<dyn RaceStore> = self.store.clone();
        let handle = spawn_race(
            self.config.race.for_match(),
            self.state.race_info().clone(),
            sink,
            Some(race_store),
        );
        for side in [Side::One, Side::Two] {
            let participant = self.state.participant(side).clone();
            handle.act(RaceAction::AutoEnter(participant)).await?;
        }
        let seed = handle.snapshot().await?.seed;

        let mut text = format!(
            "Race {number}: {} v {}. Ready up when you are ready to start.",
            self.state.participant(Side::One),
            self.state.participant(Side::Two)
        );
        if let Some(seed) = seed {
            text.push_str(&format!(" The seed for this race is {seed}."));
        }
        self.sink.write(&text);
        info!(match_id = %self.match_id, number, race = %handle.key(), "match race opened");
        let _ = self.events.send(MatchEvent::RaceOpened { number, seed });

        self.race = Some(ActiveRace {
            number,
            generation: self.generation,
            handle,
        });
        Ok(true)
    }

    async fn race_in_progress(&self) -> bool {
        match &self.race {
            Some(race) => race
                .handle
                .snapshot()
                .await
                .is_ok_and(|s| !s.status.is_terminal()),
            None => false,
        }
    }

    async fn retire_race(&mut self) {
        if let Some(race) = self.race.take() {
            let _ = race.handle.shutdown().await;
        }
    }

    async fn force_begin_race(&mut self) -> Result<bool, MatchError> {
        if self.complete {
            return Ok(false);
        }
        if let Some(race) = &self.race {
            let status = race.handle.snapshot().await?.status;
            if status == RaceStatus::EntryOpen {
                return Ok(race.handle.act(RaceAction::ForceBegin).await?);
            }
            if !status.is_terminal() {
                return Ok(false);
            }
            if status == RaceStatus::Finalized {
                // Its result is on the way; that will open the next race.
                return Ok(false);
            }
        }
        self.begin_next_race().await
    }

    /// Stops the current race and opens a new one. With `record`, the
    /// stopped race is kept as a canceled row and the next race gets a new
    /// number; without it, the race is simply run again.
    async fn cancel_race(&mut self, record: bool) -> Result<bool, MatchError> {
        let Some(race) = self.race.take() else {
            return Ok(false);
        };
        let status = race.handle.snapshot().await?.status;
        if status == RaceStatus::Finalized {
            self.race = Some(race);
            return Ok(false);
        }
        if !status.is_terminal() {
            race.handle.act(RaceAction::Cancel).await?;
        }
        let _ = race.handle.shutdown().await;

        let number = race.number;
        if record {
            self.store
                .record_match_race(MatchRaceRecord {
                    match_id: self.match_id,
                    race_number: number,
                    race_id: None,
                    winner: None,
                    canceled: true,
                    contested: false,
                })
                .await?;
            self.sink.write(&format!("Race {number} has been cancelled."));
            let _ = self.events.send(MatchEvent::RaceCanceled { number });
        } else {
            self.sink.write(&format!("Race {number} will be remade."));
        }
        info!(match_id = %self.match_id, number, recorded = record, "match race stopped by admin");

        self.begin_next_race().await?;
        Ok(true)
    }

    async fn on_race_event(&mut self, generation: u64, event: RaceEvent) {
        let Some(race) = &self.race else {
            return;
        };
        if race.generation != generation {
            debug!(match_id = %self.match_id, generation, "event from a retired race ignored");
            return;
        }
        let number = race.number;
        match event {
            RaceEvent::Finalize { result, race_id } => {
                self.on_race_finalized(number, result, race_id).await;
            }
            RaceEvent::Cancel => {
                warn!(match_id = %self.match_id, number, "match race cancelled");
                self.sink.write(&format!(
                    "Race {number} was cancelled. The match will not continue until an admin \
                     remakes or cancels the race."
                ));
                let _ = self.events.send(MatchEvent::RaceCanceled { number });
            }
            _ => {}
        }
    }

    async fn on_race_finalized(&mut self, number: u32, result: RaceResult, race_id: Option<RaceId>) {
        let Some(race_id) = race_id else {
            warn!(match_id = %self.match_id, number, "match race finalized without a record");
            self.sink.write(&format!(
                "Race {number} could not be recorded, so the match will not advance. An admin \
                 can remake the race."
            ));
            return;
        };

        let winner = result.winner().and_then(|p| self.state.side_of(p.id));
        let record = MatchRaceRecord {
            match_id: self.match_id,
            race_number: number,
            race_id: Some(race_id),
            winner,
            canceled: false,
            contested: false,
        };
        if let Err(e) = self.store.record_match_race(record).await {
            error!(match_id = %self.match_id, number, error = %e, "failed to record match race");
            self.sink.write(&format!(
                "Error: race {number} could not be added to the match record."
            ));
            return;
        }

        if self.state.is_ranked() {
            let one = self.state.participant(Side::One);
            let two = self.state.participant(Side::Two);
            match self.ratings.update_ratings(one, two, winner).await {
                Ok((r1, r2)) => {
                    info!(match_id = %self.match_id, number, rating_one = r1, rating_two = r2, "ratings updated")
                }
                Err(e) => warn!(match_id = %self.match_id, number, error = %e, "rating update failed"),
            }
        }

        match winner {
            Some(side) => self.sink.write(&format!(
                "{} wins race {number}.",
                self.state.participant(side)
            )),
            None => self.sink.write(&format!("Race {number} has no winner.")),
        }
        info!(match_id = %self.match_id, number, %race_id, ?winner, "match race recorded");
        let _ = self.events.send(MatchEvent::RaceRecorded {
            number,
            race_id,
            winner,
        });

        self.retire_race().await;
        if let Err(e) = self.begin_next_race().await {
            error!(match_id = %self.match_id, error = %e, "could not open next race");
        }
    }

    async fn finish_match(&mut self, tally: MatchRaceTally) {
        self.complete = true;
        self.alarm.cancel_any();
        self.state.mark_finished(Utc::now());
        // A failed commit is already reported; the result still stands.
        let _ = self.commit().await;

        let text = format!(
            "Match complete: {} {}-{} {}",
            self.state.participant(Side::One),
            tally.wins[0],
            tally.wins[1],
            self.state.participant(Side::Two)
        );
        self.sink.write(&text);
        self.sink.post_result(&text);
        info!(match_id = %self.match_id, wins = ?tally.wins, "match complete");
        let _ = self.events.send(MatchEvent::Complete { wins: tally.wins });
    }

    async fn commit(&mut self) -> Result<(), MatchError> {
        match self.store.commit_match(&self.state).await {
            Ok(_) => Ok(()),
            Err(e) => {
                error!(match_id = %self.match_id, error = %e, "failed to commit match");
                self.sink.write("Error: the match could not be saved.");
                Err(e.into())
            }
        }
    }
}

/// Commits `state` (assigning its id on first commit) and spawns its room.
pub async fn spawn_match_room(
    mut state: Match,
    config: MatchRoomConfig,
    sink: Arc<dyn RoomEventSink>,
    store: Arc<dyn MatchStore>,
    ratings: Arc<dyn RatingService>,
) -> Result<MatchHandle, MatchError> {
    let match_id = store.commit_match(&state).await?;
    state.set_id(match_id);

    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
    let (race_tx, race_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

    let actor = MatchActor {
        match_id,
        state,
        config,
        sink,
        store,
        ratings,
        receiver: rx,
        alarm: TimerSlot::new(),
        alarm_tx,
        alarm_rx,
        race: None,
        generation: 0,
        race_tx,
        race_rx,
        events: events.clone(),
        complete: false,
    };
    tokio::spawn(actor.run());

    Ok(MatchHandle {
        match_id,
        sender: tx,
        events,
    })
}
