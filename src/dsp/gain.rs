//! Output gain: the final scalar multiplier of every chain.

use crate::chain::{Stage, StageKind};
use crate::dsp::utils::time_constant_coeff;

pub const OUTPUT_GAIN_MIN: f32 = 0.1;
pub const OUTPUT_GAIN_MAX: f32 = 2.0;

/// Zipper-noise guard: gain changes slew over roughly this window.
const SMOOTHING_MS: f32 = 10.0;

pub struct OutputGain {
    target: f32,
    current: f32,
    smooth_coeff: f32,
    connected: bool,
}

impl OutputGain {
    pub fn new(sample_rate: f32, gain: f32) -> Self {
        let gain = gain.clamp(OUTPUT_GAIN_MIN, OUTPUT_GAIN_MAX);
        Self {
            target: gain,
            current: gain,
            smooth_coeff: time_constant_coeff(SMOOTHING_MS, sample_rate),
            connected: true,
        }
    }

    /// Retarget the gain, clamped to [0.1, 2.0]. Applied over the smoothing
    /// window on the audio path.
    pub fn set_gain(&mut self, gain: f32) {
        self.target = gain.clamp(OUTPUT_GAIN_MIN, OUTPUT_GAIN_MAX);
    }

    pub fn gain(&self) -> f32 {
        self.target
    }
}

impl Stage for OutputGain {
    fn kind(&self) -> StageKind {
        StageKind::OutputGain
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.current = self.smooth_coeff * self.current + (1.0 - self.smooth_coeff) * self.target;
        x * self.current
    }

    fn reset(&mut self) {
        self.current = self.target;
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
