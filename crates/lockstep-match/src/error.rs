//! Error types for the match layer.

use lockstep_protocol::MatchId;
use lockstep_race::{RaceError, StoreError};

/// Errors from match rooms and the match room manager.
///
/// As with races, a scheduling command the current state does not allow
/// is not an error; it comes back as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The match room's command channel is closed; the actor has stopped.
    #[error("match room {0} is unavailable")]
    Unavailable(MatchId),

    /// No open room for this match.
    #[error("match {0} has no open room")]
    NotFound(MatchId),

    /// A room for this match is already open.
    #[error("match {0} already has an open room")]
    AlreadyOpen(MatchId),

    /// Persistence or rating collaborator failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The match's active race room went away.
    #[error(transparent)]
    Race(#[from] RaceError),
}
