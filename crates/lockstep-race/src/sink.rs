//! The boundary between a race (or match) and the chat room hosting it.
//!
//! Races and matches never hold their room. They hold an
//! `Arc<dyn RoomEventSink>`, which is all they may do to it: write text,
//! refresh the status display, maintain the ping list, publish results,
//! and push lifecycle events.

use lockstep_protocol::{Participant, RaceId, UserId};
use tokio::sync::mpsc;

use crate::RaceResult;

/// Lifecycle events a race pushes to its room. Each is emitted at most
/// once per transition.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// Countdown elapsed, clock running.
    Begin,
    /// Every racer finished or forfeit; the finalize window is open.
    End,
    /// Results are final. `race_id` is `None` when no store is attached or
    /// recording failed.
    Finalize {
        result: RaceResult,
        race_id: Option<RaceId>,
    },
    Cancel,
    RacerEnter(Participant),
    RacerUnenter(Participant),
}

/// Implemented by the chat-room layer.
///
/// Methods are synchronous: an implementation queues outbound work (as
/// [`ChannelSink`] does) rather than blocking the race.
pub trait RoomEventSink: Send + Sync + 'static {
    /// Display a message in the room.
    fn write(&self, text: &str);

    /// Replace the room's persistent status display.
    fn update_leaderboard(&self, text: &str);

    /// Add a user to the "ping on next race" set.
    fn notify(&self, user: UserId);

    /// Remove a user from the "ping on next race" set.
    fn dont_notify(&self, user: UserId);

    /// Publish a finalized result outside the room.
    fn post_result(&self, text: &str);

    /// Publish an announcement outside the room (match start alerts).
    fn alert(&self, _text: &str) {}

    /// Dispose of the hosting surface. Called by the idle monitor.
    fn close(&self);

    /// Receive a race lifecycle event.
    fn race_event(&self, _event: &RaceEvent) {}
}

/// Everything a [`ChannelSink`] forwards, one variant per sink method.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomMessage {
    Write(String),
    Leaderboard(String),
    Notify(UserId),
    DontNotify(UserId),
    PostResult(String),
    Alert(String),
    Close,
    Event(RaceEvent),
}

/// A sink that forwards every call into an unbounded channel.
///
/// The room layer drains the receiver on its own task. Sends to a dropped
/// receiver are silently discarded, same as a message to a player who has
/// already left.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RoomMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RoomMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, msg: RoomMessage) {
        let _ = self.tx.send(msg);
    }
}

impl RoomEventSink for ChannelSink {
    fn write(&self, text: &str) {
        self.send(RoomMessage::Write(text.to_string()));
    }

    fn update_leaderboard(&self, text: &str) {
        self.send(RoomMessage::Leaderboard(text.to_string()));
    }

    fn notify(&self, user: UserId) {
        self.send(RoomMessage::Notify(user));
    }

    fn dont_notify(&self, user: UserId) {
        self.send(RoomMessage::DontNotify(user));
    }

    fn post_result(&self, text: &str) {
        self.send(RoomMessage::PostResult(text.to_string()));
    }

    fn alert(&self, text: &str) {
        self.send(RoomMessage::Alert(text.to_string()));
    }

    fn close(&self) {
        self.send(RoomMessage::Close);
    }

    fn race_event(&self, event: &RaceEvent) {
        self.send(RoomMessage::Event(event.clone()));
    }
}
