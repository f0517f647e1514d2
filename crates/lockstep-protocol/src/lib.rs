//! Shared vocabulary for lockstep.
//!
//! This crate defines the small value types every other layer speaks:
//!
//! - **Identity** ([`UserId`], [`RaceId`], [`MatchId`], [`Participant`]):
//!   who is racing and which durable record a race or match maps to.
//! - **Sides** ([`Side`]): the two seats of a match.
//! - **Time** ([`RaceTime`]): elapsed times in hundredths of a second,
//!   with the display and parse rules used in leaderboards and commands.
//! - **Errors** ([`ProtocolError`]): what can go wrong parsing those values.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about rooms, timers or storage. It sits
//! underneath both the race and the match layers:
//!
//! ```text
//! Match (series) → Race (state machine) → Protocol (ids, times)
//! ```

mod error;
mod time;
mod types;

pub use error::ProtocolError;
pub use time::RaceTime;
pub use types::{MatchId, Participant, RaceId, Side, UserId};
