//! Spectral notch bank for maximum-suppression mode.
//!
//! A fixed cascade aimed at transient noise sources: a low shelf against
//! breath and wind rumble, two narrow notches over the keyboard/mouse click
//! bands, and a high shelf against sibilant splatter. It audibly colors the
//! voice band, which is why the orchestrator only wires it at the ultra tier.

use crate::chain::{Stage, StageKind};
use crate::dsp::biquad::Biquad;

const LOW_SHELF_HZ: f32 = 200.0;
const LOW_SHELF_GAIN_DB: f32 = -12.0;
const CLICK_NOTCH_HZ: f32 = 3000.0;
const CLICK_NOTCH_Q: f32 = 5.0;
const TRANSIENT_NOTCH_HZ: f32 = 6500.0;
const TRANSIENT_NOTCH_Q: f32 = 4.0;
const HIGH_SHELF_HZ: f32 = 8000.0;
const HIGH_SHELF_GAIN_DB: f32 = -6.0;
const SHELF_Q: f32 = 0.7071;

pub struct SpectralNotchBank {
    low_shelf: Biquad,
    click_notch: Biquad,
    transient_notch: Biquad,
    high_shelf: Biquad,
    connected: bool,
}

impl SpectralNotchBank {
    pub fn new(sample_rate: f32) -> Self {
        let mut low_shelf = Biquad::identity();
        let mut click_notch = Biquad::identity();
        let mut transient_notch = Biquad::identity();
        let mut high_shelf = Biquad::identity();

        low_shelf.set_low_shelf(LOW_SHELF_HZ, SHELF_Q, LOW_SHELF_GAIN_DB, sample_rate);
        click_notch.set_notch(CLICK_NOTCH_HZ, CLICK_NOTCH_Q, sample_rate);
        transient_notch.set_notch(TRANSIENT_NOTCH_HZ, TRANSIENT_NOTCH_Q, sample_rate);
        high_shelf.set_high_shelf(HIGH_SHELF_HZ, SHELF_Q, HIGH_SHELF_GAIN_DB, sample_rate);

        Self {
            low_shelf,
            click_notch,
            transient_notch,
            high_shelf,
            connected: true,
        }
    }
}

impl Stage for SpectralNotchBank {
    fn kind(&self) -> StageKind {
        StageKind::NotchBank
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let x = self.low_shelf.process(x);
        let x = self.click_notch.process(x);
        let x = self.transient_notch.process(x);
        self.high_shelf.process(x)
    }

    fn reset(&mut self) {
        self.low_shelf.clear_state();
        self.click_notch.clear_state();
        self.transient_notch.clear_state();
        self.high_shelf.clear_state();
    }

    fn disconnect(&mut self) {
        self.reset();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn peak_at(stage: &mut SpectralNotchBank, freq_hz: f32, sr: f32) -> f32 {
        stage.reset();
        let mut peak = 0.0f32;
        for n in 0..sr as usize {
            let y = stage.process((TAU * freq_hz * n as f32 / sr).sin());
            if n > 24_000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn click_bands_are_rejected_while_voice_passes() {
        let sr = 48_000.0;
        let mut bank = SpectralNotchBank::new(sr);

        let click = peak_at(&mut bank, CLICK_NOTCH_HZ, sr);
        let transient = peak_at(&mut bank, TRANSIENT_NOTCH_HZ, sr);
        let voice = peak_at(&mut bank, 1000.0, sr);

        assert!(click < 0.1, "3 kHz notch leaks: {click}");
        assert!(transient < 0.15, "6.5 kHz notch leaks: {transient}");
        assert!(voice > 0.8, "voice band overly colored: {voice}");
    }
}
