//! Second-order IIR filter (biquad) used by every filtering stage.
//!
//! Coefficients follow the RBJ audio EQ cookbook. The process loop runs in
//! transposed direct form II with a tiny anti-denormal offset, which keeps it
//! safe for the audio thread: no allocations, no branches beyond the filter
//! math itself.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    s1: f32,
    s2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::identity()
    }
}

impl Biquad {
    /// A pass-through filter. Call one of the `set_*` designers before use.
    pub fn identity() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            s1: 0.0,
            s2: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.s1;
        // Anti-denormal: tiny DC offset keeps the recursion out of subnormals.
        self.s1 = self.b1 * x - self.a1 * y + self.s2 + 1e-25;
        self.s2 = self.b2 * x - self.a2 * y + 1e-25;
        y
    }

    /// Clear delay state. Coefficient updates deliberately do not touch state
    /// so cutoff sweeps stay click-free.
    #[inline]
    pub fn clear_state(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    fn apply(&mut self, b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) {
        let inv_a0 = 1.0 / a0;
        self.b0 = b0 * inv_a0;
        self.b1 = b1 * inv_a0;
        self.b2 = b2 * inv_a0;
        self.a1 = a1 * inv_a0;
        self.a2 = a2 * inv_a0;
    }

    pub fn set_highpass(&mut self, cutoff_hz: f32, q: f32, sample_rate: f32) {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sw, cw) = (w0.sin(), w0.cos());
        let alpha = sw / (2.0 * q.max(1e-6));

        let b1 = -(1.0 + cw);
        let b0 = -b1 * 0.5;
        self.apply(b0, b1, b0, 1.0 + alpha, -2.0 * cw, 1.0 - alpha);
    }

    /// Narrow band-reject filter; higher `q` means a narrower notch.
    pub fn set_notch(&mut self, center_hz: f32, q: f32, sample_rate: f32) {
        let w0 = 2.0 * PI * center_hz / sample_rate;
        let (sw, cw) = (w0.sin(), w0.cos());
        let alpha = sw / (2.0 * q.max(1e-6));

        self.apply(1.0, -2.0 * cw, 1.0, 1.0 + alpha, -2.0 * cw, 1.0 - alpha);
    }

    pub fn set_peaking(&mut self, center_hz: f32, q: f32, gain_db: f32, sample_rate: f32) {
        if gain_db.abs() < 0.01 {
            *self = Self {
                s1: self.s1,
                s2: self.s2,
                ..Self::identity()
            };
            return;
        }

        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * center_hz / sample_rate;
        let (sw, cw) = (w0.sin(), w0.cos());
        let alpha = sw / (2.0 * q.max(1e-6));

        self.apply(
            1.0 + alpha * a,
            -2.0 * cw,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cw,
            1.0 - alpha / a,
        );
    }

    pub fn set_low_shelf(&mut self, cutoff_hz: f32, q: f32, gain_db: f32, sample_rate: f32) {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sw, cw) = (w0.sin(), w0.cos());
        let alpha = sw / (2.0 * q.max(1e-6));
        let sqrt_a = a.sqrt();

        let b0 = a * ((a + 1.0) - (a - 1.0) * cw + 2.0 * sqrt_a * alpha);
        let b1 = 2.0 * a * ((a - 1.0) - (a + 1.0) * cw);
        let b2 = a * ((a + 1.0) - (a - 1.0) * cw - 2.0 * sqrt_a * alpha);
        let a0 = (a + 1.0) + (a - 1.0) * cw + 2.0 * sqrt_a * alpha;
        let a1 = -2.0 * ((a - 1.0) + (a + 1.0) * cw);
        let a2 = (a + 1.0) + (a - 1.0) * cw - 2.0 * sqrt_a * alpha;
        self.apply(b0, b1, b2, a0, a1, a2);
    }

    pub fn set_high_shelf(&mut self, cutoff_hz: f32, q: f32, gain_db: f32, sample_rate: f32) {
        let a = 10.0f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let (sw, cw) = (w0.sin(), w0.cos());
        let alpha = sw / (2.0 * q.max(1e-6));
        let sqrt_a = a.sqrt();

        let b0 = a * ((a + 1.0) + (a - 1.0) * cw + 2.0 * sqrt_a * alpha);
        let b1 = -2.0 * a * ((a - 1.0) + (a + 1.0) * cw);
        let b2 = a * ((a + 1.0) + (a - 1.0) * cw - 2.0 * sqrt_a * alpha);
        let a0 = (a + 1.0) - (a - 1.0) * cw + 2.0 * sqrt_a * alpha;
        let a1 = 2.0 * ((a - 1.0) - (a + 1.0) * cw);
        let a2 = (a + 1.0) - (a - 1.0) * cw - 2.0 * sqrt_a * alpha;
        self.apply(b0, b1, b2, a0, a1, a2);
    }
}
