//! Error types for the race layer.
//!
//! Invalid race transitions are not errors here: they come back as
//! `false` from [`RaceHandle::act`](crate::RaceHandle::act). These enums
//! only cover a room that is gone and a store that failed.

use crate::RaceKey;

/// Errors talking to a race room.
#[derive(Debug, thiserror::Error)]
pub enum RaceError {
    /// The room's command channel is closed; the actor has stopped.
    #[error("race room {0} is unavailable")]
    Unavailable(RaceKey),
}

/// Errors reported by a persistence collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A record the caller referred to does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
}
