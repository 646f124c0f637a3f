//! Frequency-domain voice activity detection with hysteresis.
//!
//! The engine keeps a rolling analysis window over the raw microphone tap,
//! scores each tick from three spectral band averages, and runs a two-state
//! machine (SPEAKING / SILENT) with a single silence timer. Voice onset flips
//! the state immediately; silence must outlast the grace period before the
//! state falls back, which keeps natural speech pauses from chattering the
//! classification.
//!
//! Ticks are driven by the caller with an explicit millisecond timestamp so
//! the grace boundary is exact and testable.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::{
    ProcessingOptions, VAD_GRACE_MAX_MS, VAD_GRACE_MIN_MS, VAD_THRESHOLD_MAX, VAD_THRESHOLD_MIN,
};
use crate::error::Error;
use crate::params::ParamCell;

/// Fixed analysis transform size.
pub const FFT_SIZE: usize = 2048;
const SPECTRUM_BINS: usize = FFT_SIZE / 2;

// Cross-tick spectral smoothing factor (previous-frame weight).
const SMOOTHING_TIME_CONSTANT: f32 = 0.6;

// Scoring bands. Speech energy concentrates in the voice band; hum and fan
// rumble sit below it, clicks and plosive bursts above it.
const VOICE_BAND_LOW_HZ: f32 = 80.0;
const VOICE_BAND_HIGH_HZ: f32 = 3400.0;
const LOW_NOISE_MAX_HZ: f32 = 60.0;
const HIGH_NOISE_MIN_HZ: f32 = 4000.0;

// Voice must dominate both noise bands by these ratios.
const LOW_NOISE_RATIO: f32 = 3.0;
const HIGH_NOISE_RATIO: f32 = 2.0;
// Absolute floor on the byte-scale voice average, below which nothing
// qualifies as speech no matter how quiet the noise bands are.
const VOICE_FLOOR: f32 = 30.0;

// Byte-scale spectrum mapping: -100..-30 dBFS onto 0..255.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

// voiceLevel = min(100, voice band average * LEVEL_SCALE).
const LEVEL_SCALE: f32 = 0.4;

/// Properties of the audio source the engine analyzes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub channels: u16,
    pub sample_rate: f32,
}

impl SourceInfo {
    pub fn validate(&self) -> Result<(), Error> {
        if self.channels == 0 {
            return Err(Error::ZeroChannels);
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

/// Runtime knobs shared between the control context and the engine. Values
/// clamp at store time and take effect on the next tick.
pub struct VadControls {
    threshold: ParamCell,
    grace_ms: AtomicU32,
}

impl VadControls {
    fn new(options: &ProcessingOptions) -> Self {
        Self {
            threshold: ParamCell::new(options.vad_threshold()),
            grace_ms: AtomicU32::new(options.vad_grace_ms()),
        }
    }

    pub fn set_threshold(&self, threshold: f32) -> Result<(), Error> {
        if !threshold.is_finite() {
            return Err(Error::NonFiniteParameter {
                field: "vad_threshold",
                value: threshold,
            });
        }
        self.threshold
            .store(threshold.clamp(VAD_THRESHOLD_MIN, VAD_THRESHOLD_MAX));
        Ok(())
    }

    pub fn threshold(&self) -> f32 {
        self.threshold.load()
    }

    pub fn set_grace_ms(&self, grace_ms: u32) {
        self.grace_ms.store(
            grace_ms.clamp(VAD_GRACE_MIN_MS, VAD_GRACE_MAX_MS),
            Ordering::Relaxed,
        );
    }

    pub fn grace_ms(&self) -> u32 {
        self.grace_ms.load(Ordering::Relaxed)
    }
}

/// Classification readout published by the engine after every tick, sampled
/// by the UI at its own rate.
pub struct VadReadout {
    speaking: AtomicBool,
    level: ParamCell,
}

impl VadReadout {
    fn new() -> Self {
        Self {
            speaking: AtomicBool::new(false),
            level: ParamCell::new(0.0),
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Relaxed)
    }

    /// Smoothed voice-band level, 0–100, independent of the classification.
    pub fn voice_level(&self) -> f32 {
        self.level.load()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Speaking,
    Silent,
}

pub struct VadEngine {
    // Rolling analysis window over the raw tap.
    ring: Vec<f32>,
    write_pos: usize,

    fft: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    window: Vec<f32>,
    window_norm: f32,
    // Cross-tick smoothed linear magnitudes, one per bin.
    smoothed: Vec<f32>,

    voice_bins: (usize, usize),
    low_noise_bins: (usize, usize),
    high_noise_bins: (usize, usize),

    classification: Classification,
    last_speech_ms: Option<u64>,
    silence_started_ms: Option<u64>,

    controls: Arc<VadControls>,
    readout: Arc<VadReadout>,
}

impl VadEngine {
    /// Construct against a validated source. Fails fast on an unusable
    /// source; the engine never initializes partially or lazily.
    pub fn new(source: &SourceInfo, options: &ProcessingOptions) -> Result<Self, Error> {
        source.validate()?;
        let sr = source.sample_rate;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let fft_scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        let window: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                let phase = (i as f32) / (FFT_SIZE as f32 - 1.0);
                0.5 - 0.5 * (std::f32::consts::TAU * phase).cos()
            })
            .collect();
        // Peak-bin magnitude of a full-scale sine is window_sum / 2.
        let window_norm = 2.0 / window.iter().sum::<f32>();

        let bin = |hz: f32| -> usize {
            ((hz / sr) * FFT_SIZE as f32).round() as usize
        };
        let voice_bins = (
            bin(VOICE_BAND_LOW_HZ).max(1),
            bin(VOICE_BAND_HIGH_HZ).min(SPECTRUM_BINS - 1),
        );
        let low_noise_bins = (0, bin(LOW_NOISE_MAX_HZ).min(SPECTRUM_BINS - 1));
        let high_noise_bins = (bin(HIGH_NOISE_MIN_HZ).min(SPECTRUM_BINS - 1), SPECTRUM_BINS - 1);

        log::debug!(
            "vad engine up: sr={sr} Hz, threshold={}, grace={} ms",
            options.vad_threshold(),
            options.vad_grace_ms()
        );

        Ok(Self {
            ring: vec![0.0; FFT_SIZE],
            write_pos: 0,
            fft,
            fft_scratch,
            spectrum: vec![Complex::default(); FFT_SIZE],
            window,
            window_norm,
            smoothed: vec![0.0; SPECTRUM_BINS],
            voice_bins,
            low_noise_bins,
            high_noise_bins,
            classification: Classification::Silent,
            last_speech_ms: None,
            silence_started_ms: None,
            controls: Arc::new(VadControls::new(options)),
            readout: Arc::new(VadReadout::new()),
        })
    }

    pub fn controls(&self) -> Arc<VadControls> {
        Arc::clone(&self.controls)
    }

    pub fn readout(&self) -> Arc<VadReadout> {
        Arc::clone(&self.readout)
    }

    /// Feed raw samples into the rolling window. No allocation.
    #[inline]
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % FFT_SIZE;
        }
    }

    /// Run one analysis tick at the given timestamp and return the updated
    /// classification. Bounded-time work over preallocated buffers.
    pub fn tick(&mut self, now_ms: u64) -> Classification {
        // Unroll the ring so the window applies in capture order.
        for i in 0..FFT_SIZE {
            let src = (self.write_pos + i) % FFT_SIZE;
            self.spectrum[i] = Complex::new(self.ring[src] * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        for i in 0..SPECTRUM_BINS {
            let mag = self.spectrum[i].norm() * self.window_norm;
            let prev = self.smoothed[i];
            let next = SMOOTHING_TIME_CONSTANT * prev + (1.0 - SMOOTHING_TIME_CONSTANT) * mag;
            // A stray NaN from an edge-case bin must not poison the smoother.
            self.smoothed[i] = if next.is_finite() { next } else { prev };
        }

        let voice_avg = self.band_average(self.voice_bins);
        let low_noise_avg = self.band_average(self.low_noise_bins);
        let high_noise_avg = self.band_average(self.high_noise_bins);

        let voice_present = voice_avg > self.controls.threshold()
            && voice_avg > VOICE_FLOOR
            && voice_avg > low_noise_avg * LOW_NOISE_RATIO
            && voice_avg > high_noise_avg * HIGH_NOISE_RATIO;

        if voice_present {
            self.classification = Classification::Speaking;
            self.last_speech_ms = Some(now_ms);
            self.silence_started_ms = None;
        } else if self.classification == Classification::Speaking {
            let started = *self.silence_started_ms.get_or_insert(now_ms);
            // Strictly greater: at exactly the grace period the state holds.
            if now_ms.saturating_sub(started) > u64::from(self.controls.grace_ms()) {
                self.classification = Classification::Silent;
            }
        }

        self.readout.speaking.store(
            self.classification == Classification::Speaking,
            Ordering::Relaxed,
        );
        self.readout
            .level
            .store((voice_avg * LEVEL_SCALE).min(100.0));

        self.classification
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn last_speech_ms(&self) -> Option<u64> {
        self.last_speech_ms
    }

    /// Average byte-scale (0–255) level over an inclusive bin range.
    fn band_average(&self, (lo, hi): (usize, usize)) -> f32 {
        if hi < lo {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in lo..=hi {
            sum += byte_level(self.smoothed[i]);
        }
        sum / (hi - lo + 1) as f32
    }

    /// Clear signal state and fall back to SILENT. Knobs are untouched.
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
        self.write_pos = 0;
        self.classification = Classification::Silent;
        self.last_speech_ms = None;
        self.silence_started_ms = None;
        self.readout.speaking.store(false, Ordering::Relaxed);
        self.readout.level.store(0.0);
    }
}

/// Map a linear magnitude onto the 0–255 byte scale spanning -100..-30 dBFS.
#[inline]
fn byte_level(mag: f32) -> f32 {
    let db = 20.0 * (mag.max(1e-10)).log10();
    ((db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0).clamp(0.0, 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, QualityTier};

    const SR: f32 = 48_000.0;

    fn engine() -> VadEngine {
        let source = SourceInfo {
            channels: 1,
            sample_rate: SR,
        };
        VadEngine::new(&source, &resolve(QualityTier::Basic)).unwrap()
    }

    /// Broadband voice-band content: partials every 100 Hz from 400–3200 Hz.
    fn speech_like(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f32 / SR;
                let mut s = 0.0;
                let mut hz = 400.0;
                while hz <= 3200.0 {
                    s += 0.12 * (std::f32::consts::TAU * hz * t).sin();
                    hz += 100.0;
                }
                s
            })
            .collect()
    }

    fn hum(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                let t = n as f32 / SR;
                0.8 * (std::f32::consts::TAU * 50.0 * t).sin()
            })
            .collect()
    }

    fn drive_to_speaking(vad: &mut VadEngine, now_ms: u64) {
        vad.push_samples(&speech_like(FFT_SIZE));
        for _ in 0..8 {
            vad.tick(now_ms);
        }
        assert_eq!(vad.classification(), Classification::Speaking);
    }

    #[test]
    fn zero_channel_source_is_a_construction_error() {
        let source = SourceInfo {
            channels: 0,
            sample_rate: SR,
        };
        let err = match VadEngine::new(&source, &resolve(QualityTier::Basic)) {
            Err(e) => e,
            Ok(_) => panic!("zero-channel source accepted"),
        };
        assert!(matches!(err, Error::ZeroChannels));
        assert!(!err.is_configuration());
    }

    #[test]
    fn invalid_sample_rate_is_a_construction_error() {
        let source = SourceInfo {
            channels: 1,
            sample_rate: -1.0,
        };
        assert!(matches!(
            VadEngine::new(&source, &resolve(QualityTier::Basic)),
            Err(Error::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn threshold_setter_clamps_to_documented_range() {
        let vad = engine();
        let controls = vad.controls();
        controls.set_threshold(0.0).unwrap();
        assert_eq!(controls.threshold(), VAD_THRESHOLD_MIN);
        controls.set_threshold(250.0).unwrap();
        assert_eq!(controls.threshold(), VAD_THRESHOLD_MAX);
        assert!(controls.set_threshold(f32::NAN).is_err());
    }

    #[test]
    fn grace_setter_clamps_to_documented_range() {
        let vad = engine();
        let controls = vad.controls();
        controls.set_grace_ms(1);
        assert_eq!(controls.grace_ms(), VAD_GRACE_MIN_MS);
        controls.set_grace_ms(60_000);
        assert_eq!(controls.grace_ms(), VAD_GRACE_MAX_MS);
    }

    #[test]
    fn voice_band_energy_flips_to_speaking() {
        let mut vad = engine();
        vad.push_samples(&speech_like(FFT_SIZE));
        // A few ticks to let the cross-tick smoother settle.
        let mut c = Classification::Silent;
        for _ in 0..8 {
            c = vad.tick(0);
        }
        assert_eq!(c, Classification::Speaking);
        assert!(vad.readout().is_speaking());
        assert!(vad.readout().voice_level() > 0.0);
    }

    #[test]
    fn strong_voice_flips_to_speaking_on_the_first_tick() {
        let mut vad = engine();
        vad.push_samples(&speech_like(FFT_SIZE));
        // Onset latency bound: even through the cross-tick smoother, a full
        // window of strong voice-band energy classifies immediately.
        assert_eq!(vad.tick(0), Classification::Speaking);
    }

    #[test]
    fn hum_alone_never_counts_as_speech() {
        let mut vad = engine();
        vad.push_samples(&hum(FFT_SIZE));
        for _ in 0..16 {
            assert_eq!(vad.tick(0), Classification::Silent);
        }
        assert!(!vad.readout().is_speaking());
    }

    #[test]
    fn silence_alone_never_counts_as_speech() {
        let mut vad = engine();
        vad.push_samples(&vec![0.0; FFT_SIZE]);
        assert_eq!(vad.tick(0), Classification::Silent);
    }

    #[test]
    fn grace_period_boundary_is_exact() {
        let mut vad = engine();
        drive_to_speaking(&mut vad, 0);

        // Silence from t=1000; the timer starts at the first absent tick.
        vad.push_samples(&vec![0.0; FFT_SIZE]);
        for _ in 0..16 {
            vad.tick(1000);
        }
        assert_eq!(vad.classification(), Classification::Speaking);

        // Default grace is 300 ms: still speaking 1 ms before it elapses,
        // silent 1 ms after.
        assert_eq!(vad.tick(1000 + 299), Classification::Speaking);
        assert_eq!(vad.tick(1000 + 301), Classification::Silent);
    }

    #[test]
    fn speech_resuming_within_grace_resets_the_timer() {
        let mut vad = engine();
        drive_to_speaking(&mut vad, 0);

        vad.push_samples(&vec![0.0; FFT_SIZE]);
        for _ in 0..16 {
            vad.tick(1000);
        }

        // Voice returns before the grace period elapses.
        drive_to_speaking(&mut vad, 1200);

        // Silence again: the old timer must not carry over.
        vad.push_samples(&vec![0.0; FFT_SIZE]);
        for _ in 0..16 {
            vad.tick(2000);
        }
        assert_eq!(vad.tick(2000 + 299), Classification::Speaking);
        assert_eq!(vad.tick(2000 + 301), Classification::Silent);
    }

    #[test]
    fn voice_level_is_capped_at_one_hundred() {
        let mut vad = engine();
        let loud: Vec<f32> = speech_like(FFT_SIZE).iter().map(|s| s * 3.0).collect();
        vad.push_samples(&loud);
        for _ in 0..8 {
            vad.tick(0);
        }
        assert!(vad.readout().voice_level() <= 100.0);
    }

    #[test]
    fn reset_returns_to_silent_without_touching_knobs() {
        let mut vad = engine();
        vad.controls().set_threshold(60.0).unwrap();
        drive_to_speaking(&mut vad, 0);

        vad.reset();
        assert_eq!(vad.classification(), Classification::Silent);
        assert!(!vad.readout().is_speaking());
        assert_eq!(vad.readout().voice_level(), 0.0);
        assert_eq!(vad.controls().threshold(), 60.0);
    }
}
