//! Processing options, quality tiers, and the preset resolver.
//!
//! `ProcessingOptions` is an immutable-per-session snapshot: the caller
//! resolves a tier, optionally merges overrides, and hands the result by
//! value to the orchestrator and VAD engine. Every numeric field clamps at
//! the point of mutation — reads never re-validate.
//!
//! Gating and VAD default off at every tier: hard-gating a live stream
//! produces audible truncation under real microphone variance, so the
//! aggressive tiers lean on filtering and dynamics instead.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Named quality tiers, ordered by processing aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Basic,
    Balanced,
    Professional,
    Ultra,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Basic,
        QualityTier::Balanced,
        QualityTier::Professional,
        QualityTier::Ultra,
    ];

    /// Parse a tier name from the config boundary. Unknown names are a
    /// configuration error, never silently defaulted.
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name {
            "basic" => Ok(QualityTier::Basic),
            "balanced" => Ok(QualityTier::Balanced),
            "professional" => Ok(QualityTier::Professional),
            "ultra" => Ok(QualityTier::Ultra),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityTier::Basic => "basic",
            QualityTier::Balanced => "balanced",
            QualityTier::Professional => "professional",
            QualityTier::Ultra => "ultra",
        }
    }
}

// Documented parameter ranges. Clamping happens in the setters below and in
// the runtime control handles; both sides share these bounds.
pub const VAD_THRESHOLD_MIN: f32 = 5.0;
pub const VAD_THRESHOLD_MAX: f32 = 100.0;
pub const VAD_GRACE_MIN_MS: u32 = 100;
pub const VAD_GRACE_MAX_MS: u32 = 2000;
pub const GATE_THRESHOLD_MIN_DB: f32 = -100.0;
pub const GATE_THRESHOLD_MAX_DB: f32 = 0.0;

use crate::dsp::gain::{OUTPUT_GAIN_MAX, OUTPUT_GAIN_MIN};
use crate::dsp::high_pass::{HPF_CUTOFF_MAX_HZ, HPF_CUTOFF_MIN_HZ};

/// Immutable-per-session processing configuration snapshot.
///
/// Fields are private so mutation always routes through the clamping setters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessingOptions {
    quality: QualityTier,
    use_suppression: bool,
    vad_enabled: bool,
    vad_threshold: f32,
    vad_grace_ms: u32,
    high_pass: bool,
    high_pass_cutoff_hz: f32,
    use_noise_gate: bool,
    noise_gate_threshold_db: f32,
    use_voice_eq: bool,
    use_de_esser: bool,
    use_compressor: bool,
    use_limiter: bool,
    output_gain: f32,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        resolve(QualityTier::Basic)
    }
}

/// Resolve a named tier to its concrete parameter set. Pure and
/// deterministic: same tier in, field-equal options out.
pub fn resolve(tier: QualityTier) -> ProcessingOptions {
    let base = ProcessingOptions {
        quality: tier,
        use_suppression: false,
        vad_enabled: false,
        vad_threshold: 25.0,
        vad_grace_ms: 300,
        high_pass: false,
        high_pass_cutoff_hz: 80.0,
        use_noise_gate: false,
        noise_gate_threshold_db: -50.0,
        use_voice_eq: false,
        use_de_esser: false,
        use_compressor: false,
        use_limiter: false,
        output_gain: 1.0,
    };

    match tier {
        // Most stable: delegate everything to the upstream capture layer.
        QualityTier::Basic => base,
        QualityTier::Balanced => ProcessingOptions {
            vad_threshold: 40.0,
            high_pass: true,
            high_pass_cutoff_hz: 80.0,
            ..base
        },
        QualityTier::Professional => ProcessingOptions {
            use_suppression: true,
            vad_threshold: 50.0,
            high_pass: true,
            high_pass_cutoff_hz: 100.0,
            noise_gate_threshold_db: -55.0,
            use_voice_eq: true,
            use_compressor: true,
            use_limiter: true,
            output_gain: 1.1,
            ..base
        },
        QualityTier::Ultra => ProcessingOptions {
            use_suppression: true,
            vad_threshold: 80.0,
            vad_grace_ms: 150,
            high_pass: true,
            high_pass_cutoff_hz: 120.0,
            noise_gate_threshold_db: -70.0,
            use_voice_eq: true,
            use_de_esser: true,
            use_compressor: true,
            use_limiter: true,
            output_gain: 1.2,
            ..base
        },
    }
}

fn finite(field: &'static str, value: f32) -> Result<f32, Error> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::NonFiniteParameter { field, value })
    }
}

impl ProcessingOptions {
    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    /// Aggressive mode: maximum-suppression filtering for the ultra tier.
    pub fn aggressive(&self) -> bool {
        self.quality == QualityTier::Ultra
    }

    pub fn use_suppression(&self) -> bool {
        self.use_suppression
    }

    pub fn vad_enabled(&self) -> bool {
        self.vad_enabled
    }

    pub fn vad_threshold(&self) -> f32 {
        self.vad_threshold
    }

    pub fn vad_grace_ms(&self) -> u32 {
        self.vad_grace_ms
    }

    pub fn high_pass(&self) -> bool {
        self.high_pass
    }

    pub fn high_pass_cutoff_hz(&self) -> f32 {
        self.high_pass_cutoff_hz
    }

    pub fn use_noise_gate(&self) -> bool {
        self.use_noise_gate
    }

    pub fn noise_gate_threshold_db(&self) -> f32 {
        self.noise_gate_threshold_db
    }

    pub fn use_voice_eq(&self) -> bool {
        self.use_voice_eq
    }

    pub fn use_de_esser(&self) -> bool {
        self.use_de_esser
    }

    pub fn use_compressor(&self) -> bool {
        self.use_compressor
    }

    pub fn use_limiter(&self) -> bool {
        self.use_limiter
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    pub fn set_vad_enabled(&mut self, enabled: bool) {
        self.vad_enabled = enabled;
    }

    pub fn set_vad_threshold(&mut self, threshold: f32) -> Result<(), Error> {
        let t = finite("vad_threshold", threshold)?;
        self.vad_threshold = t.clamp(VAD_THRESHOLD_MIN, VAD_THRESHOLD_MAX);
        Ok(())
    }

    pub fn set_vad_grace_ms(&mut self, grace_ms: u32) {
        self.vad_grace_ms = grace_ms.clamp(VAD_GRACE_MIN_MS, VAD_GRACE_MAX_MS);
    }

    pub fn set_high_pass(&mut self, enabled: bool) {
        self.high_pass = enabled;
    }

    pub fn set_high_pass_cutoff_hz(&mut self, cutoff_hz: f32) -> Result<(), Error> {
        let c = finite("high_pass_cutoff_hz", cutoff_hz)?;
        self.high_pass_cutoff_hz = c.clamp(HPF_CUTOFF_MIN_HZ, HPF_CUTOFF_MAX_HZ);
        Ok(())
    }

    pub fn set_use_noise_gate(&mut self, enabled: bool) {
        self.use_noise_gate = enabled;
    }

    pub fn set_noise_gate_threshold_db(&mut self, threshold_db: f32) -> Result<(), Error> {
        let t = finite("noise_gate_threshold_db", threshold_db)?;
        self.noise_gate_threshold_db = t.clamp(GATE_THRESHOLD_MIN_DB, GATE_THRESHOLD_MAX_DB);
        Ok(())
    }

    pub fn set_use_suppression(&mut self, enabled: bool) {
        self.use_suppression = enabled;
    }

    pub fn set_use_voice_eq(&mut self, enabled: bool) {
        self.use_voice_eq = enabled;
    }

    pub fn set_use_de_esser(&mut self, enabled: bool) {
        self.use_de_esser = enabled;
    }

    pub fn set_use_compressor(&mut self, enabled: bool) {
        self.use_compressor = enabled;
    }

    pub fn set_use_limiter(&mut self, enabled: bool) {
        self.use_limiter = enabled;
    }

    pub fn set_output_gain(&mut self, gain: f32) -> Result<(), Error> {
        let g = finite("output_gain", gain)?;
        self.output_gain = g.clamp(OUTPUT_GAIN_MIN, OUTPUT_GAIN_MAX);
        Ok(())
    }

    /// Merge partial overrides onto this snapshot, field by field. Unset
    /// fields keep the preset defaults; set fields route through the
    /// clamping setters.
    pub fn apply(&mut self, overrides: &ProcessingOverrides) -> Result<(), Error> {
        if let Some(v) = overrides.vad_enabled {
            self.set_vad_enabled(v);
        }
        if let Some(v) = overrides.vad_threshold {
            self.set_vad_threshold(v)?;
        }
        if let Some(v) = overrides.vad_grace_ms {
            self.set_vad_grace_ms(v);
        }
        if let Some(v) = overrides.high_pass {
            self.set_high_pass(v);
        }
        if let Some(v) = overrides.high_pass_cutoff_hz {
            self.set_high_pass_cutoff_hz(v)?;
        }
        if let Some(v) = overrides.use_noise_gate {
            self.set_use_noise_gate(v);
        }
        if let Some(v) = overrides.noise_gate_threshold_db {
            self.set_noise_gate_threshold_db(v)?;
        }
        if let Some(v) = overrides.use_suppression {
            self.set_use_suppression(v);
        }
        if let Some(v) = overrides.use_voice_eq {
            self.set_use_voice_eq(v);
        }
        if let Some(v) = overrides.use_de_esser {
            self.set_use_de_esser(v);
        }
        if let Some(v) = overrides.use_compressor {
            self.set_use_compressor(v);
        }
        if let Some(v) = overrides.use_limiter {
            self.set_use_limiter(v);
        }
        if let Some(v) = overrides.output_gain {
            self.set_output_gain(v)?;
        }
        Ok(())
    }
}

/// Partial overrides from the config boundary. All fields optional so a
/// sparse JSON object only touches what it names.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOverrides {
    pub vad_enabled: Option<bool>,
    pub vad_threshold: Option<f32>,
    pub vad_grace_ms: Option<u32>,
    pub high_pass: Option<bool>,
    pub high_pass_cutoff_hz: Option<f32>,
    pub use_noise_gate: Option<bool>,
    pub noise_gate_threshold_db: Option<f32>,
    pub use_suppression: Option<bool>,
    pub use_voice_eq: Option<bool>,
    pub use_de_esser: Option<bool>,
    pub use_compressor: Option<bool>,
    pub use_limiter: Option<bool>,
    pub output_gain: Option<f32>,
}

impl ProcessingOverrides {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }
}
