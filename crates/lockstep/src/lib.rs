//! # Lockstep
//!
//! Race rooms and scheduled head-to-head matches.
//!
//! A race is a small state machine owned by an actor task: racers enter,
//! ready up, count down, finish or forfeit, and the result is recorded
//! after a correction window. A match strings races together until its
//! format (best-of-N or repeat-N) is decided, opening the first one when
//! the agreed start time arrives.
//!
//! This crate re-exports the layers and adds the pieces a host process
//! needs: [`EngineConfig`], [`init_tracing`] and [`LockstepError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lockstep::prelude::*;
//!
//! # async fn run() -> Result<(), LockstepError> {
//! lockstep::init_tracing();
//! let config = EngineConfig::load();
//!
//! let (sink, _messages) = ChannelSink::new();
//! let race = spawn_race(config.race_config(), RaceInfo::default(), Arc::new(sink), None);
//! race.act(RaceAction::Enter(Participant::new(UserId(1), "ada"))).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod telemetry;

pub use config::{ConfigError, EngineConfig};
pub use error::LockstepError;
pub use telemetry::init_tracing;

pub use lockstep_match as matches;
pub use lockstep_protocol as protocol;
pub use lockstep_race as race;
pub use lockstep_timer as timer;

pub mod prelude {
    pub use crate::{EngineConfig, LockstepError};
    pub use lockstep_match::{
        Match, MatchAction, MatchEvent, MatchFormat, MatchHandle, MatchRoomConfig,
        MatchRoomManager, MatchStore, MemoryStore, RatingService, spawn_match_room,
    };
    pub use lockstep_protocol::{MatchId, Participant, RaceId, RaceTime, Side, UserId};
    pub use lockstep_race::{
        ChannelSink, IdlePolicy, RaceAction, RaceConfig, RaceHandle, RaceInfo, RaceStatus,
        RoomEventSink, RoomMessage, spawn_idle_monitor, spawn_race,
    };
}
