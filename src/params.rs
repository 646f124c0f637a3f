//! Lock-free parameter cells crossing the control/audio boundary.
//!
//! Continuous knobs (gain, thresholds, cutoff) travel as `f32` bits in an
//! `AtomicU32`: the control context is the single writer, the audio callback
//! the single reader. No lock is ever taken on the hot path.

use std::sync::atomic::{AtomicU32, Ordering};

pub struct ParamCell(AtomicU32);

impl ParamCell {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Runtime-adjustable chain knobs. Writers clamp before storing; the audio
/// side applies the values at block boundaries without rebuilding the chain.
pub struct ChainParams {
    pub gate_threshold_db: ParamCell,
    pub high_pass_cutoff_hz: ParamCell,
    pub presence_gain_db: ParamCell,
    pub limiter_threshold_db: ParamCell,
    pub output_gain: ParamCell,
}

impl ChainParams {
    pub fn from_options(options: &crate::config::ProcessingOptions) -> Self {
        Self {
            gate_threshold_db: ParamCell::new(options.noise_gate_threshold_db()),
            high_pass_cutoff_hz: ParamCell::new(options.high_pass_cutoff_hz()),
            presence_gain_db: ParamCell::new(3.0),
            limiter_threshold_db: ParamCell::new(-1.0),
            output_gain: ParamCell::new(options.output_gain()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_round_trips_values() {
        let cell = ParamCell::new(1.5);
        assert_eq!(cell.load(), 1.5);
        cell.store(-70.25);
        assert_eq!(cell.load(), -70.25);
    }

    #[test]
    fn cell_preserves_exact_bit_patterns() {
        let cell = ParamCell::new(0.0);
        cell.store(f32::MIN_POSITIVE);
        assert_eq!(cell.load(), f32::MIN_POSITIVE);
    }
}
