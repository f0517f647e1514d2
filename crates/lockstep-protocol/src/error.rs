//! Error types for the protocol layer.
//!
//! Each crate in lockstep defines its own error enum. A `ProtocolError`
//! always means a value could not be parsed, never that a room or store
//! misbehaved.

/// Errors that can occur while parsing protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A time string did not match `[[h:]m:]s[.hh]`.
    #[error("invalid time: {0}")]
    InvalidTime(String),
}
