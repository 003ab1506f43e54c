use thiserror::Error;

use crate::session::SessionId;

/// Everything that can go wrong between a button press and a delivered file.
///
/// Overlay/frame assets that are merely missing are NOT errors: the pipeline
/// falls back (solid fill / skip) and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no active session for {0}; send a new photo first")]
    StaleSession(SessionId),

    #[error("unrecognized choice key: {0:?}")]
    MalformedChoice(String),

    #[error("out-of-order choice: expected a {expected} choice, got {got:?}")]
    OutOfOrderChoice {
        expected: &'static str,
        got: String,
    },

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode output: {0}")]
    Encode(String),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("session configuration is incomplete")]
    Incomplete,
}
