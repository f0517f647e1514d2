//! Races for lockstep.
//!
//! Each race runs as an isolated Tokio task (actor model) that owns the
//! race state, its racers, and its timers.
//!
//! # Key types
//!
//! - [`RaceHandle`]: send [`RaceAction`]s to a running race actor
//! - [`RaceStatus`]: the race lifecycle state machine
//! - [`RaceConfig`] / [`RaceInfo`]: timings, policy, and what is being raced
//! - [`RoomEventSink`]: everything a race may do to the room hosting it
//! - [`RaceStore`]: where finalized races are recorded
//! - [`spawn_idle_monitor`]: closes rooms nobody entered

mod config;
mod error;
mod monitor;
mod race;
mod racer;
mod result;
mod room;
mod sink;
mod store;

pub use config::{RaceConfig, RaceInfo, RaceStatus};
pub use error::{RaceError, StoreError};
pub use monitor::{IdlePolicy, spawn_idle_monitor};
pub use race::{RaceAction, RaceKey, RaceSnapshot, RaceTimer};
pub use racer::{Level, MAX_COMMENT_LEN, Racer, RacerState};
pub use result::{RaceResult, RacerResult};
pub use room::{RaceHandle, spawn_race};
pub use sink::{ChannelSink, RaceEvent, RoomEventSink, RoomMessage};
pub use store::RaceStore;
