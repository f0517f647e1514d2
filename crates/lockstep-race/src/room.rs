//! Race room actor: an isolated Tokio task that owns one [`Race`].
//!
//! Commands from the outside world and timer steps from the race's own
//! timers both arrive as messages, and the actor handles them one at a
//! time. That single loop is the race's only lock.

use std::sync::Arc;

use lockstep_protocol::RaceId;
use tokio::sync::{mpsc, oneshot};

use crate::race::{Race, TimerFired};
use crate::{RaceAction, RaceConfig, RaceError, RaceInfo, RaceKey, RaceResult, RaceSnapshot, RaceStore, RoomEventSink};

/// Default command channel size for race actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Commands sent to a race actor through its channel.
pub(crate) enum RaceCommand {
    /// Apply one race operation and report whether it changed anything.
    Act {
        action: RaceAction,
        reply: oneshot::Sender<bool>,
    },

    Snapshot {
        reply: oneshot::Sender<RaceSnapshot>,
    },

    Leaderboard {
        reply: oneshot::Sender<String>,
    },

    /// Stop the actor. Any armed timer is dropped with the race.
    Shutdown,
}

/// Handle to a running race actor.
///
/// Cheap to clone; it is just an `mpsc::Sender` wrapper. Once every handle
/// is dropped the actor stops.
#[derive(Clone)]
pub struct RaceHandle {
    key: RaceKey,
    sender: mpsc::Sender<RaceCommand>,
}

impl RaceHandle {
    pub fn key(&self) -> RaceKey {
        self.key
    }

    /// Applies `action`. `Ok(false)` means the current state did not allow
    /// it and nothing changed.
    pub async fn act(&self, action: RaceAction) -> Result<bool, RaceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RaceCommand::Act {
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RaceError::Unavailable(self.key))?;
        reply_rx.await.map_err(|_| RaceError::Unavailable(self.key))
    }

    pub async fn snapshot(&self) -> Result<RaceSnapshot, RaceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RaceCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| RaceError::Unavailable(self.key))?;
        reply_rx.await.map_err(|_| RaceError::Unavailable(self.key))
    }

    /// Current leaderboard text, exactly as last pushed to the sink.
    pub async fn leaderboard(&self) -> Result<String, RaceError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RaceCommand::Leaderboard { reply: reply_tx })
            .await
            .map_err(|_| RaceError::Unavailable(self.key))?;
        reply_rx.await.map_err(|_| RaceError::Unavailable(self.key))
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), RaceError> {
        self.sender
            .send(RaceCommand::Shutdown)
            .await
            .map_err(|_| RaceError::Unavailable(self.key))
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct RaceActor {
    race: Race,
    sink: Arc<dyn RoomEventSink>,
    store: Option<Arc<dyn RaceStore>>,
    receiver: mpsc::Receiver<RaceCommand>,
    timers: mpsc::UnboundedReceiver<TimerFired>,
}

impl RaceActor {
    async fn run(mut self) {
        let key = self.race.key();
        tracing::info!(race = %key, "race actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                Some(fired) = self.timers.recv() => {
                    if let Some(result) = self.race.on_timer(fired) {
                        let race_id = self.record(&result).await;
                        self.race.publish_result(result, race_id);
                    }
                }
            }
        }

        tracing::info!(race = %key, status = %self.race.status(), "race actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, cmd: RaceCommand) -> bool {
        match cmd {
            RaceCommand::Act { action, reply } => {
                tracing::trace!(race = %self.race.key(), ?action, "race command");
                let _ = reply.send(self.race.apply(action));
            }
            RaceCommand::Snapshot { reply } => {
                let _ = reply.send(self.race.snapshot());
            }
            RaceCommand::Leaderboard { reply } => {
                let _ = reply.send(self.race.leaderboard_text());
            }
            RaceCommand::Shutdown => {
                tracing::info!(race = %self.race.key(), "race shutting down");
                return false;
            }
        }
        true
    }

    /// Persists a finalized race. A failure leaves the race finalized but
    /// unrecorded; the room is told and no id is attached.
    async fn record(&self, result: &RaceResult) -> Option<RaceId> {
        let store = self.store.as_ref()?;
        match store.record_race(result).await {
            Ok(race_id) => {
                tracing::info!(race = %self.race.key(), %race_id, "race recorded");
                Some(race_id)
            }
            Err(e) => {
                tracing::error!(race = %self.race.key(), error = %e, "failed to record race");
                self.sink
                    .write(&format!("Error: these results could not be recorded ({e})."));
                None
            }
        }
    }
}

/// Builds a race, opens entry, and spawns its actor.
///
/// Without a `store`, finalized races are announced but never recorded.
pub fn spawn_race(
    config: RaceConfig,
    info: RaceInfo,
    sink: Arc<dyn RoomEventSink>,
    store: Option<Arc<dyn RaceStore>>,
) -> RaceHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();

    let mut race = Race::new(config, info, Arc::clone(&sink), timer_tx);
    race.initialize();
    let key = race.key();

    let actor = RaceActor {
        race,
        sink,
        store,
        receiver: rx,
        timers: timer_rx,
    };
    tokio::spawn(actor.run());

    RaceHandle { key, sender: tx }
}
