//! Matches for lockstep: scheduled series of races between two players.
//!
//! A [`Match`] holds the scheduling handshake and the format. Each open
//! match runs in a match room actor that arms the start-time alarm, opens
//! one race at a time through `lockstep-race`, records each finalized
//! race, and stops once the format says the match is decided.
//!
//! # Key types
//!
//! - [`Match`]: participants, suggested time, confirmations, format
//! - [`MatchHandle`]: send [`MatchAction`]s to a running match room
//! - [`MatchRoomManager`]: opens rooms and recovers them after a restart
//! - [`MatchStore`] / [`RatingService`]: persistence and rating collaborators
//! - [`MemoryStore`]: in-memory implementation of both

mod alarm;
mod error;
mod manager;
mod room;
mod state;
mod store;

pub use alarm::{AlarmPlan, AlarmStep, plan as plan_alarm};
pub use error::MatchError;
pub use manager::MatchRoomManager;
pub use room::{MatchAction, MatchEvent, MatchHandle, MatchRoomConfig, MatchSnapshot, spawn_match_room};
pub use state::{Match, MatchFormat, MatchRaceRecord, MatchRaceTally, Unconfirm};
pub use store::{MatchStore, MemoryStore, RatingService};
