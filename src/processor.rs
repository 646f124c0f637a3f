//! Pipeline front-end: the audio-side conditioner and its control handle.
//!
//! Construction yields a pair: [`MicConditioner`] moves to the real-time
//! audio callback, [`ControlHandle`] stays with the UI/event context. All
//! communication between them is single-writer single-reader: continuous
//! knobs travel through atomic cells, whole-engine rebuilds travel through
//! a pair of SPSC rings so the audio side swaps states with a pop and never
//! frees memory. Retired states flow back to the control side, which tears
//! them down at leisure.

use std::sync::Arc;

use ringbuf::{Consumer, Producer, RingBuffer};

use crate::chain::{SignalChain, Stage, StageKind};
use crate::config::{resolve, ProcessingOptions, ProcessingOverrides, QualityTier};
use crate::dsp::dynamics::{LIMITER_THRESHOLD_MAX_DB, LIMITER_THRESHOLD_MIN_DB};
use crate::dsp::voice_eq::{PRESENCE_GAIN_MAX_DB, PRESENCE_GAIN_MIN_DB};
use crate::error::Error;
use crate::params::ChainParams;
use crate::vad::{SourceInfo, VadControls, VadEngine, VadReadout};

// Swap-ring depth. Two rebuilds can sit unconsumed before a third is
// refused; the control context collects retired states before every push.
const SWAP_RING_CAP: usize = 4;

/// One complete, self-consistent processing state: chain, its parameter
/// cells, and the optional VAD engine. Swapped as a unit so the audio side
/// never observes a half-reconfigured pipeline.
struct EngineState {
    chain: SignalChain,
    params: Arc<ChainParams>,
    vad: Option<VadEngine>,
}

impl EngineState {
    fn build(
        source: &SourceInfo,
        options: &ProcessingOptions,
        external: Option<Box<dyn Stage>>,
    ) -> Result<Self, Error> {
        source.validate()?;
        let chain = SignalChain::build(options, source.sample_rate, external)?;
        let vad = if options.vad_enabled() {
            Some(VadEngine::new(source, options)?)
        } else {
            None
        };
        Ok(EngineState {
            chain,
            params: Arc::new(ChainParams::from_options(options)),
            vad,
        })
    }

    fn teardown(&mut self) {
        self.chain.teardown();
        if let Some(vad) = self.vad.as_mut() {
            vad.reset();
        }
    }
}

/// Audio-side half of the pipeline. Lives on the real-time callback; every
/// method is bounded-time, allocation-free, and lock-free.
pub struct MicConditioner {
    state: EngineState,
    incoming: Consumer<EngineState>,
    retired: Producer<EngineState>,
}

impl MicConditioner {
    /// Build a conditioner/control pair against a validated source.
    ///
    /// Fails whole: a bad source or malformed options leave nothing
    /// partially initialized. Supplying `external` selects the suppression
    /// chain topology.
    pub fn new(
        source: SourceInfo,
        options: ProcessingOptions,
        external: Option<Box<dyn Stage>>,
    ) -> Result<(MicConditioner, ControlHandle), Error> {
        let state = EngineState::build(&source, &options, external)?;

        let (to_rt, incoming) = RingBuffer::<EngineState>::new(SWAP_RING_CAP).split();
        let (retired, from_rt) = RingBuffer::<EngineState>::new(SWAP_RING_CAP).split();

        let handle = ControlHandle {
            source,
            options,
            params: Arc::clone(&state.params),
            vad_controls: state.vad.as_ref().map(|v| v.controls()),
            vad_readout: state.vad.as_ref().map(|v| v.readout()),
            to_rt,
            from_rt,
        };
        let conditioner = MicConditioner {
            state,
            incoming,
            retired,
        };
        log::info!(
            "conditioner up: {:?} tier, {} stages, {} Hz",
            handle.options.quality(),
            conditioner.state.chain.len(),
            source.sample_rate
        );
        Ok((conditioner, handle))
    }

    /// Condition one block in place at the given timestamp.
    ///
    /// Swaps in any pending rebuilt state, applies the current knob values,
    /// runs the VAD tick off the raw tap, then the stage path.
    pub fn process_block(&mut self, samples: &mut [f32], now_ms: u64) {
        while let Some(next) = self.incoming.pop() {
            let old = std::mem::replace(&mut self.state, next);
            if self.retired.push(old).is_err() {
                // Ring full: the control side stopped collecting. Dropping
                // here frees on the audio thread, but a stalled control
                // context already broke the contract.
                debug_assert!(false, "retired-state ring overflow");
            }
        }

        self.state.chain.apply_params(&self.state.params);

        if let Some(vad) = self.state.vad.as_mut() {
            vad.push_samples(samples);
            vad.tick(now_ms);
        }

        self.state.chain.process_block(samples);
    }

    /// Current stage path, entry to exit.
    pub fn path(&self) -> Vec<StageKind> {
        self.state.chain.path()
    }
}

/// Control-side half of the pipeline: runtime knobs, VAD queries, and
/// reconfiguration. Single-threaded by contract (one writer).
pub struct ControlHandle {
    source: SourceInfo,
    options: ProcessingOptions,
    params: Arc<ChainParams>,
    vad_controls: Option<Arc<VadControls>>,
    vad_readout: Option<Arc<VadReadout>>,
    to_rt: Producer<EngineState>,
    from_rt: Consumer<EngineState>,
}

impl ControlHandle {
    /// Current options snapshot.
    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    pub fn set_output_gain(&mut self, gain: f32) -> Result<(), Error> {
        self.options.set_output_gain(gain)?;
        self.params.output_gain.store(self.options.output_gain());
        Ok(())
    }

    pub fn set_noise_gate_threshold(&mut self, threshold_db: f32) -> Result<(), Error> {
        self.options.set_noise_gate_threshold_db(threshold_db)?;
        self.params
            .gate_threshold_db
            .store(self.options.noise_gate_threshold_db());
        Ok(())
    }

    pub fn set_high_pass_cutoff(&mut self, cutoff_hz: f32) -> Result<(), Error> {
        self.options.set_high_pass_cutoff_hz(cutoff_hz)?;
        self.params
            .high_pass_cutoff_hz
            .store(self.options.high_pass_cutoff_hz());
        Ok(())
    }

    pub fn set_presence_gain(&mut self, gain_db: f32) -> Result<(), Error> {
        if !gain_db.is_finite() {
            return Err(Error::NonFiniteParameter {
                field: "presence_gain_db",
                value: gain_db,
            });
        }
        self.params
            .presence_gain_db
            .store(gain_db.clamp(PRESENCE_GAIN_MIN_DB, PRESENCE_GAIN_MAX_DB));
        Ok(())
    }

    pub fn set_limiter_threshold(&mut self, threshold_db: f32) -> Result<(), Error> {
        if !threshold_db.is_finite() {
            return Err(Error::NonFiniteParameter {
                field: "limiter_threshold_db",
                value: threshold_db,
            });
        }
        self.params
            .limiter_threshold_db
            .store(threshold_db.clamp(LIMITER_THRESHOLD_MIN_DB, LIMITER_THRESHOLD_MAX_DB));
        Ok(())
    }

    /// Update the VAD detection threshold; takes effect on the next tick.
    pub fn set_vad_threshold(&mut self, threshold: f32) -> Result<(), Error> {
        self.options.set_vad_threshold(threshold)?;
        if let Some(controls) = &self.vad_controls {
            controls.set_threshold(threshold)?;
        }
        Ok(())
    }

    /// Update the VAD grace period; takes effect on the next tick.
    pub fn set_vad_grace_period(&mut self, grace_ms: u32) {
        self.options.set_vad_grace_ms(grace_ms);
        if let Some(controls) = &self.vad_controls {
            controls.set_grace_ms(grace_ms);
        }
    }

    /// Latest VAD classification; `false` when VAD is disabled.
    pub fn is_speaking(&self) -> bool {
        self.vad_readout.as_ref().map_or(false, |r| r.is_speaking())
    }

    /// Latest 0–100 voice-band level; `0` when VAD is disabled.
    pub fn voice_level(&self) -> f32 {
        self.vad_readout.as_ref().map_or(0.0, |r| r.voice_level())
    }

    /// Rebuild the pipeline with the given overrides merged onto the
    /// current options. The new state is built off the real-time path and
    /// handed over atomically; the old one comes back for teardown via
    /// [`ControlHandle::collect_retired`].
    pub fn reconfigure(
        &mut self,
        overrides: &ProcessingOverrides,
        external: Option<Box<dyn Stage>>,
    ) -> Result<(), Error> {
        // Validate against a scratch copy so a bad override changes nothing.
        let mut next = self.options;
        next.apply(overrides)?;
        self.install(next, external)
    }

    /// Re-resolve every option from a quality tier and rebuild.
    pub fn switch_quality(
        &mut self,
        tier: QualityTier,
        external: Option<Box<dyn Stage>>,
    ) -> Result<(), Error> {
        self.install(resolve(tier), external)
    }

    fn install(
        &mut self,
        options: ProcessingOptions,
        external: Option<Box<dyn Stage>>,
    ) -> Result<(), Error> {
        self.collect_retired();

        let state = EngineState::build(&self.source, &options, external)?;
        let params = Arc::clone(&state.params);
        let vad_controls = state.vad.as_ref().map(|v| v.controls());
        let vad_readout = state.vad.as_ref().map(|v| v.readout());

        if let Err(mut refused) = self.to_rt.push(state) {
            // Swap ring saturated: too many rebuilds in flight.
            refused.teardown();
            log::warn!("reconfigure refused: swap ring full");
            return Ok(());
        }

        log::info!("reconfigured to {:?} tier", options.quality());
        self.options = options;
        self.params = params;
        self.vad_controls = vad_controls;
        self.vad_readout = vad_readout;
        Ok(())
    }

    /// Tear down states the audio side has retired. Returns how many were
    /// collected.
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while let Some(mut state) = self.from_rt.pop() {
            state.teardown();
            count += 1;
        }
        if count > 0 {
            log::debug!("collected {count} retired engine state(s)");
        }
        count
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.collect_retired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StageKind;

    const SR: f32 = 48_000.0;

    fn source() -> SourceInfo {
        SourceInfo {
            channels: 1,
            sample_rate: SR,
        }
    }

    fn pair(tier: QualityTier) -> (MicConditioner, ControlHandle) {
        MicConditioner::new(source(), resolve(tier), None).unwrap()
    }

    #[test]
    fn construction_fails_whole_on_bad_source() {
        let bad = SourceInfo {
            channels: 0,
            sample_rate: SR,
        };
        assert!(matches!(
            MicConditioner::new(bad, resolve(QualityTier::Basic), None),
            Err(Error::ZeroChannels)
        ));
    }

    #[test]
    fn basic_tier_is_near_passthrough() {
        let (mut rt, _handle) = pair(QualityTier::Basic);
        // Converge the gain smoother first.
        let mut warmup = vec![0.5; 4096];
        rt.process_block(&mut warmup, 0);

        let mut block = vec![0.25; 256];
        rt.process_block(&mut block, 10);
        for s in &block {
            assert!((s - 0.25).abs() < 1e-3, "basic tier altered audio: {s}");
        }
    }

    #[test]
    fn gain_knob_reaches_the_audio_side_without_rebuild() {
        let (mut rt, mut handle) = pair(QualityTier::Basic);
        handle.set_output_gain(2.0).unwrap();

        let mut block = vec![0.25; 48_000];
        rt.process_block(&mut block, 0);
        let last = block[block.len() - 1];
        assert!((last - 0.5).abs() < 0.01, "gain update not applied: {last}");
    }

    #[test]
    fn knob_setters_clamp_and_reject_non_finite() {
        let (_rt, mut handle) = pair(QualityTier::Basic);
        handle.set_output_gain(99.0).unwrap();
        assert_eq!(handle.options().output_gain(), 2.0);
        assert!(handle.set_output_gain(f32::NAN).is_err());
        assert!(handle.set_limiter_threshold(f32::INFINITY).is_err());
        assert!(handle.set_presence_gain(f32::NAN).is_err());
    }

    #[test]
    fn vad_disabled_reads_as_silent() {
        let (_rt, handle) = pair(QualityTier::Ultra);
        assert!(!handle.is_speaking());
        assert_eq!(handle.voice_level(), 0.0);
    }

    #[test]
    fn vad_threshold_updates_apply_without_rebuild() {
        let mut options = resolve(QualityTier::Basic);
        options.set_vad_enabled(true);
        let (_rt, mut handle) = MicConditioner::new(source(), options, None).unwrap();

        handle.set_vad_threshold(350.0).unwrap();
        assert_eq!(handle.options().vad_threshold(), 100.0);
        handle.set_vad_grace_period(50);
        assert_eq!(handle.options().vad_grace_ms(), 100);
    }

    #[test]
    fn reconfigure_swaps_the_chain_and_retires_the_old_state() {
        let (mut rt, mut handle) = pair(QualityTier::Basic);
        assert_eq!(rt.path(), vec![StageKind::OutputGain]);

        handle.switch_quality(QualityTier::Professional, None).unwrap();
        let mut block = vec![0.0; 256];
        rt.process_block(&mut block, 0);

        assert!(rt.path().contains(&StageKind::VoiceEq));
        assert!(rt.path().contains(&StageKind::Limiter));
        assert_eq!(handle.collect_retired(), 1);
    }

    #[test]
    fn bad_override_leaves_the_pipeline_untouched() {
        let (mut rt, mut handle) = pair(QualityTier::Balanced);
        let before = rt.path();

        let ov = ProcessingOverrides {
            output_gain: Some(f32::NAN),
            ..Default::default()
        };
        assert!(handle.reconfigure(&ov, None).is_err());

        let mut block = vec![0.0; 64];
        rt.process_block(&mut block, 0);
        assert_eq!(rt.path(), before);
        assert_eq!(handle.options().quality(), QualityTier::Balanced);
    }

    #[test]
    fn vad_runs_off_the_raw_tap_when_enabled() {
        let mut options = resolve(QualityTier::Basic);
        options.set_vad_enabled(true);
        let (mut rt, handle) = MicConditioner::new(source(), options, None).unwrap();

        // Broadband voice-band content, same shape the VAD unit tests use.
        let block: Vec<f32> = (0..4096)
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
            .collect();

        for k in 0..8 {
            let mut b = block.clone();
            rt.process_block(&mut b, k * 10);
        }
        assert!(handle.is_speaking());
        assert!(handle.voice_level() > 0.0);
    }
}
