//! Unified error type for lockstep.

use lockstep_match::MatchError;
use lockstep_protocol::ProtocolError;
use lockstep_race::{RaceError, StoreError};

use crate::config::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// Callers using the `lockstep` facade handle this one type; `?` converts
/// sub-crate errors through the generated `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum LockstepError {
    /// A value could not be parsed (e.g. a race time).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A race room has stopped.
    #[error(transparent)]
    Race(#[from] RaceError),

    /// A persistence collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A match room is missing, stopped, or already open.
    #[error(transparent)]
    Match(#[from] MatchError),

    /// The configuration file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use lockstep_protocol::{MatchId, RaceTime};

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err = "soon".parse::<RaceTime>().unwrap_err();
        let err: LockstepError = err.into();
        assert!(matches!(err, LockstepError::Protocol(_)));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_from_store_error() {
        let err: LockstepError = StoreError::Unavailable("db down".into()).into();
        assert!(matches!(err, LockstepError::Store(_)));
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn test_from_match_error() {
        let err: LockstepError = MatchError::NotFound(MatchId(4)).into();
        assert!(matches!(err, LockstepError::Match(_)));
    }

    #[test]
    fn test_from_config_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: LockstepError = ConfigError::Parse {
            path: "x.json".into(),
            source: parse,
        }
        .into();
        assert!(matches!(err, LockstepError::Config(_)));
        assert!(err.to_string().contains("x.json"));
    }
}
