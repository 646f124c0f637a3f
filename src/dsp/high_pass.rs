//! High-pass stages: DC blocker, configurable single filter, and the
//! aggressive dual cascade.
//!
//! The DC blocker sits at the head of every chain so offset and click
//! artifacts are gone before any gain stage can amplify them. The dual
//! cascade stacks two filters at distinct cutoffs for a steeper effective
//! rolloff against fan and AC rumble.

use crate::chain::{Stage, StageKind};
use crate::dsp::biquad::Biquad;

/// Butterworth Q: flat passband, no resonant bump at the cutoff.
pub const BUTTERWORTH_Q: f32 = 0.7071;

const DC_CUTOFF_HZ: f32 = 5.0;

/// Cutoff bounds for the configurable high-pass. Fan noise lives around
/// 50-100 Hz; voice fundamentals start near 80 Hz.
pub const HPF_CUTOFF_MIN_HZ: f32 = 20.0;
pub const HPF_CUTOFF_MAX_HZ: f32 = 200.0;

/// Single high-pass pole near 0 Hz to remove DC offset and pops.
pub struct DcBlocker {
    filter: Biquad,
    connected: bool,
}

impl DcBlocker {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Biquad::identity();
        filter.set_highpass(DC_CUTOFF_HZ, BUTTERWORTH_Q, sample_rate);
        Self {
            filter,
            connected: true,
        }
    }
}

impl Stage for DcBlocker {
    fn kind(&self) -> StageKind {
        StageKind::DcBlocker
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.filter.process(x)
    }

    fn reset(&mut self) {
        self.filter.clear_state();
    }

    fn disconnect(&mut self) {
        self.filter.clear_state();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Adjustable-cutoff high-pass with a flat (Butterworth) passband.
pub struct HighPassFilter {
    filter: Biquad,
    cutoff_hz: f32,
    sample_rate: f32,
    connected: bool,
}

impl HighPassFilter {
    pub fn new(sample_rate: f32, cutoff_hz: f32) -> Self {
        let cutoff = cutoff_hz.clamp(HPF_CUTOFF_MIN_HZ, HPF_CUTOFF_MAX_HZ);
        let mut filter = Biquad::identity();
        filter.set_highpass(cutoff, BUTTERWORTH_Q, sample_rate);
        Self {
            filter,
            cutoff_hz: cutoff,
            sample_rate,
            connected: true,
        }
    }

    /// Retune the cutoff without clearing filter state (click-free sweep).
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let cutoff = cutoff_hz.clamp(HPF_CUTOFF_MIN_HZ, HPF_CUTOFF_MAX_HZ);
        if (cutoff - self.cutoff_hz).abs() > f32::EPSILON {
            self.cutoff_hz = cutoff;
            self.filter
                .set_highpass(cutoff, BUTTERWORTH_Q, self.sample_rate);
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }
}

impl Stage for HighPassFilter {
    fn kind(&self) -> StageKind {
        StageKind::HighPass
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.filter.process(x)
    }

    fn reset(&mut self) {
        self.filter.clear_state();
    }

    fn disconnect(&mut self) {
        self.filter.clear_state();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Two cascaded high-pass filters at distinct cutoffs. The second runs at a
/// sharper Q for a steeper knee.
pub struct DualHighPass {
    first: Biquad,
    second: Biquad,
    connected: bool,
}

impl DualHighPass {
    /// Cutoffs for standard conditioning.
    pub const STANDARD_CUTOFFS_HZ: (f32, f32) = (60.0, 100.0);
    /// Cutoffs when maximum rumble rejection is requested.
    pub const AGGRESSIVE_CUTOFFS_HZ: (f32, f32) = (100.0, 150.0);

    const SECOND_STAGE_Q: f32 = 1.414;

    pub fn new(sample_rate: f32, cutoff1_hz: f32, cutoff2_hz: f32) -> Self {
        let mut first = Biquad::identity();
        let mut second = Biquad::identity();
        first.set_highpass(cutoff1_hz, BUTTERWORTH_Q, sample_rate);
        second.set_highpass(cutoff2_hz, Self::SECOND_STAGE_Q, sample_rate);
        Self {
            first,
            second,
            connected: true,
        }
    }

    pub fn standard(sample_rate: f32) -> Self {
        let (c1, c2) = Self::STANDARD_CUTOFFS_HZ;
        Self::new(sample_rate, c1, c2)
    }

    pub fn aggressive(sample_rate: f32) -> Self {
        let (c1, c2) = Self::AGGRESSIVE_CUTOFFS_HZ;
        Self::new(sample_rate, c1, c2)
    }
}

impl Stage for DualHighPass {
    fn kind(&self) -> StageKind {
        StageKind::DualHighPass
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.second.process(self.first.process(x))
    }

    fn reset(&mut self) {
        self.first.clear_state();
        self.second.clear_state();
    }

    fn disconnect(&mut self) {
        self.reset();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
