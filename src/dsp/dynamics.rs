//! Dynamics processing: noise gate, soft compressor, and limiter.
//!
//! All three roles share one gain computer: an attack/release envelope
//! follower feeding a (soft-)knee curve. The role only changes the
//! parameterization:
//!
//! - **Noise gate** — extreme ratio, hard knee, fast ballistics. Smoother
//!   than a true gate; the instantaneous-cutoff variant truncates syllables
//!   under real microphone variance.
//! - **Soft compressor** — gentle leveling with a very wide knee so gain
//!   changes never pump audibly.
//! - **Limiter** — near-ceiling threshold and high ratio as the final safety
//!   stage against clipping after upstream gain.

use crate::chain::{Stage, StageKind};
use crate::dsp::utils::{db_to_lin, lin_to_db, time_constant_coeff, DB_EPS};

// Limiter ceiling trim range. Narrow on purpose: the limiter is a safety
// stage, not a creative one.
pub const LIMITER_THRESHOLD_MIN_DB: f32 = -10.0;
pub const LIMITER_THRESHOLD_MAX_DB: f32 = -0.1;

/// Role of a [`DynamicsStage`] within the chain; fixes its threshold bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    NoiseGate,
    Compressor,
    Limiter,
}

impl Role {
    fn threshold_bounds_db(self) -> (f32, f32) {
        match self {
            Role::NoiseGate | Role::Compressor => (-100.0, 0.0),
            Role::Limiter => (LIMITER_THRESHOLD_MIN_DB, LIMITER_THRESHOLD_MAX_DB),
        }
    }
}

pub struct DynamicsStage {
    role: Role,
    threshold_db: f32,
    ratio: f32,
    knee_db: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    connected: bool,
}

impl DynamicsStage {
    fn new(
        role: Role,
        sample_rate: f32,
        threshold_db: f32,
        ratio: f32,
        knee_db: f32,
        attack_ms: f32,
        release_ms: f32,
    ) -> Self {
        let (lo, hi) = role.threshold_bounds_db();
        Self {
            role,
            threshold_db: threshold_db.clamp(lo, hi),
            ratio,
            knee_db,
            attack_coeff: time_constant_coeff(attack_ms, sample_rate),
            release_coeff: time_constant_coeff(release_ms, sample_rate),
            envelope: 0.0,
            connected: true,
        }
    }

    /// Extreme-ratio gate. Aggressive mode tightens the ballistics for
    /// maximum-suppression chains.
    pub fn noise_gate(sample_rate: f32, threshold_db: f32, aggressive: bool) -> Self {
        let (attack_ms, release_ms) = if aggressive { (2.0, 60.0) } else { (5.0, 100.0) };
        Self::new(
            Role::NoiseGate,
            sample_rate,
            threshold_db,
            20.0,
            0.0,
            attack_ms,
            release_ms,
        )
    }

    pub fn soft_compressor(sample_rate: f32) -> Self {
        Self::new(Role::Compressor, sample_rate, -50.0, 6.0, 20.0, 5.0, 150.0)
    }

    pub fn limiter(sample_rate: f32) -> Self {
        Self::new(Role::Limiter, sample_rate, -1.0, 20.0, 0.0, 1.0, 100.0)
    }

    /// Update the threshold, clamped to the role's documented bounds.
    pub fn set_threshold(&mut self, threshold_db: f32) {
        let (lo, hi) = self.role.threshold_bounds_db();
        self.threshold_db = threshold_db.clamp(lo, hi);
    }

    pub fn threshold_db(&self) -> f32 {
        self.threshold_db
    }

    #[inline]
    fn knee_reduction_db(&self, over_db: f32) -> f32 {
        let half = self.knee_db * 0.5;
        if over_db <= -half {
            0.0
        } else if over_db >= half {
            over_db * (1.0 - 1.0 / self.ratio)
        } else {
            let x = over_db + half;
            (x * x) / (2.0 * self.knee_db) * (1.0 - 1.0 / self.ratio)
        }
    }
}

impl Stage for DynamicsStage {
    fn kind(&self) -> StageKind {
        match self.role {
            Role::NoiseGate => StageKind::NoiseGate,
            Role::Compressor => StageKind::Compressor,
            Role::Limiter => StageKind::Limiter,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let level = x.abs();

        // Envelope follower: fast toward rising input, slow on decay.
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

        let over_db = lin_to_db(self.envelope.max(DB_EPS)) - self.threshold_db;
        let reduction_db = if self.knee_db <= f32::EPSILON {
            // Hard knee
            if over_db > 0.0 {
                over_db * (1.0 - 1.0 / self.ratio)
            } else {
                0.0
            }
        } else {
            self.knee_reduction_db(over_db)
        };

        x * db_to_lin(-reduction_db)
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn disconnect(&mut self) {
        self.envelope = 0.0;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_steady(stage: &mut DynamicsStage, amplitude: f32, samples: usize) -> f32 {
        let mut peak = 0.0f32;
        for n in 0..samples {
            let x = amplitude * (std::f32::consts::TAU * 1000.0 * n as f32 / 48_000.0).sin();
            let y = stage.process(x);
            if n > samples / 2 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn limiter_holds_peaks_near_ceiling() {
        let mut limiter = DynamicsStage::limiter(48_000.0);
        let peak = run_steady(&mut limiter, 1.8, 48_000);
        // -1 dB threshold at 20:1 leaves almost nothing above 0.9 linear
        assert!(peak < 1.05, "limiter let {peak} through");
    }

    #[test]
    fn limiter_passes_quiet_signal_unchanged() {
        let mut limiter = DynamicsStage::limiter(48_000.0);
        let peak = run_steady(&mut limiter, 0.1, 48_000);
        assert!((peak - 0.1).abs() < 0.01, "quiet signal altered: {peak}");
    }

    #[test]
    fn compressor_reduces_loud_material() {
        let mut comp = DynamicsStage::soft_compressor(48_000.0);
        let loud = run_steady(&mut comp, 1.0, 48_000);
        assert!(loud < 0.6, "6:1 above -50 dB should reduce strongly: {loud}");
    }

    #[test]
    fn limiter_threshold_clamps_to_role_bounds() {
        let mut limiter = DynamicsStage::limiter(48_000.0);
        limiter.set_threshold(5.0);
        assert_eq!(limiter.threshold_db(), -0.1);
        limiter.set_threshold(-40.0);
        assert_eq!(limiter.threshold_db(), -10.0);
    }

    #[test]
    fn gate_threshold_clamps_to_db_range() {
        let mut gate = DynamicsStage::noise_gate(48_000.0, -55.0, false);
        gate.set_threshold(-200.0);
        assert_eq!(gate.threshold_db(), -100.0);
        gate.set_threshold(10.0);
        assert_eq!(gate.threshold_db(), 0.0);
    }
}
