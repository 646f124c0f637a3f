//! Error taxonomy for the conditioning pipeline.
//!
//! Two surfaced categories: configuration errors (bad input from the config
//! boundary) and construction errors (an unusable audio source). Teardown is
//! deliberately absent — `disconnect()` is infallible by contract — and
//! per-tick anomalies are clamped on the audio path instead of propagated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("unknown quality tier: {0:?}")]
    UnknownTier(String),

    #[error("{field} must be finite, got {value}")]
    NonFiniteParameter { field: &'static str, value: f32 },

    #[error("malformed options override: {0}")]
    MalformedOverride(#[from] serde_json::Error),

    // --- Construction errors ---
    #[error("audio source reports zero channels")]
    ZeroChannels,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f32),
}

impl Error {
    /// True for errors originating from the configuration boundary.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownTier(_) | Error::NonFiniteParameter { .. } | Error::MalformedOverride(_)
        )
    }
}
