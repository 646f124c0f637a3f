//! Voice EQ: presence boost for intelligibility, mild high cut for harshness.

use crate::chain::{Stage, StageKind};
use crate::dsp::biquad::Biquad;

const PRESENCE_HZ: f32 = 3000.0;
const PRESENCE_GAIN_DB: f32 = 3.0;
const PRESENCE_Q: f32 = 1.5;
const HIGH_CUT_HZ: f32 = 8000.0;
const HIGH_CUT_GAIN_DB: f32 = -2.0;
const HIGH_CUT_Q: f32 = 0.7;

pub const PRESENCE_GAIN_MIN_DB: f32 = -6.0;
pub const PRESENCE_GAIN_MAX_DB: f32 = 6.0;

pub struct VoiceEq {
    presence: Biquad,
    high_cut: Biquad,
    presence_gain_db: f32,
    sample_rate: f32,
    connected: bool,
}

impl VoiceEq {
    pub fn new(sample_rate: f32) -> Self {
        let mut presence = Biquad::identity();
        let mut high_cut = Biquad::identity();
        presence.set_peaking(PRESENCE_HZ, PRESENCE_Q, PRESENCE_GAIN_DB, sample_rate);
        high_cut.set_peaking(HIGH_CUT_HZ, HIGH_CUT_Q, HIGH_CUT_GAIN_DB, sample_rate);
        Self {
            presence,
            high_cut,
            presence_gain_db: PRESENCE_GAIN_DB,
            sample_rate,
            connected: true,
        }
    }

    /// Trim the presence band, clamped to ±6 dB.
    pub fn set_presence_gain(&mut self, gain_db: f32) {
        let gain = gain_db.clamp(PRESENCE_GAIN_MIN_DB, PRESENCE_GAIN_MAX_DB);
        if (gain - self.presence_gain_db).abs() > f32::EPSILON {
            self.presence_gain_db = gain;
            self.presence
                .set_peaking(PRESENCE_HZ, PRESENCE_Q, gain, self.sample_rate);
        }
    }

    pub fn presence_gain_db(&self) -> f32 {
        self.presence_gain_db
    }
}

impl Stage for VoiceEq {
    fn kind(&self) -> StageKind {
        StageKind::VoiceEq
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.high_cut.process(self.presence.process(x))
    }

    fn reset(&mut self) {
        self.presence.clear_state();
        self.high_cut.clear_state();
    }

    fn disconnect(&mut self) {
        self.reset();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
