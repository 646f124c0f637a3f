//! Signal chain topology: arena-owned stages wired as a single linear path.
//!
//! The chain exclusively owns its stages. Topology is an ordered list of
//! arena indices — stages never hold references to the chain or to their
//! siblings, so a rebuild can never leave a dangling stage behind. Exactly
//! one entry (the first stage) and one exit (the last) exist; there are no
//! branches and no cycles by construction.

use crate::config::ProcessingOptions;
use crate::dsp::{
    DcBlocker, DeEsser, DualHighPass, DynamicsStage, HighPassFilter, OutputGain,
    SpectralNotchBank, VoiceEq,
};
use crate::dsp::utils::sanitize;
use crate::error::Error;
use crate::params::ChainParams;

/// One processing unit in a chain.
///
/// `disconnect` is idempotent and never fails: teardown may run from error
/// paths and must always complete.
pub trait Stage: Send {
    fn kind(&self) -> StageKind;

    /// Process one sample. Bounded-time arithmetic only: no allocation, no
    /// locking, no blocking.
    fn process(&mut self, sample: f32) -> f32;

    /// Clear internal signal state without changing parameters.
    fn reset(&mut self);

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    DcBlocker,
    DualHighPass,
    NotchBank,
    HighPass,
    NoiseGate,
    ExternalSuppression,
    VoiceEq,
    DeEsser,
    Compressor,
    Limiter,
    OutputGain,
}

/// Arena slot. Built-in stages are stored concretely so runtime parameter
/// application needs no downcasting; the external suppression stage arrives
/// as a trait object from the caller.
enum Slot {
    DcBlocker(DcBlocker),
    DualHighPass(DualHighPass),
    NotchBank(SpectralNotchBank),
    HighPass(HighPassFilter),
    NoiseGate(DynamicsStage),
    External(Box<dyn Stage>),
    VoiceEq(VoiceEq),
    DeEsser(DeEsser),
    Compressor(DynamicsStage),
    Limiter(DynamicsStage),
    OutputGain(OutputGain),
}

impl Slot {
    fn kind(&self) -> StageKind {
        match self {
            Slot::DcBlocker(s) => s.kind(),
            Slot::DualHighPass(s) => s.kind(),
            Slot::NotchBank(s) => s.kind(),
            Slot::HighPass(s) => s.kind(),
            Slot::NoiseGate(s) => s.kind(),
            Slot::External(s) => s.kind(),
            Slot::VoiceEq(s) => s.kind(),
            Slot::DeEsser(s) => s.kind(),
            Slot::Compressor(s) => s.kind(),
            Slot::Limiter(s) => s.kind(),
            Slot::OutputGain(s) => s.kind(),
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        match self {
            Slot::DcBlocker(s) => s.process(x),
            Slot::DualHighPass(s) => s.process(x),
            Slot::NotchBank(s) => s.process(x),
            Slot::HighPass(s) => s.process(x),
            Slot::NoiseGate(s) => s.process(x),
            Slot::External(s) => s.process(x),
            Slot::VoiceEq(s) => s.process(x),
            Slot::DeEsser(s) => s.process(x),
            Slot::Compressor(s) => s.process(x),
            Slot::Limiter(s) => s.process(x),
            Slot::OutputGain(s) => s.process(x),
        }
    }

    fn disconnect(&mut self) {
        match self {
            Slot::DcBlocker(s) => s.disconnect(),
            Slot::DualHighPass(s) => s.disconnect(),
            Slot::NotchBank(s) => s.disconnect(),
            Slot::HighPass(s) => s.disconnect(),
            Slot::NoiseGate(s) => s.disconnect(),
            Slot::External(s) => s.disconnect(),
            Slot::VoiceEq(s) => s.disconnect(),
            Slot::DeEsser(s) => s.disconnect(),
            Slot::Compressor(s) => s.disconnect(),
            Slot::Limiter(s) => s.disconnect(),
            Slot::OutputGain(s) => s.disconnect(),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            Slot::DcBlocker(s) => s.is_connected(),
            Slot::DualHighPass(s) => s.is_connected(),
            Slot::NotchBank(s) => s.is_connected(),
            Slot::HighPass(s) => s.is_connected(),
            Slot::NoiseGate(s) => s.is_connected(),
            Slot::External(s) => s.is_connected(),
            Slot::VoiceEq(s) => s.is_connected(),
            Slot::DeEsser(s) => s.is_connected(),
            Slot::Compressor(s) => s.is_connected(),
            Slot::Limiter(s) => s.is_connected(),
            Slot::OutputGain(s) => s.is_connected(),
        }
    }
}

pub struct SignalChain {
    slots: Vec<Slot>,
    /// Ordered arena indices, entry first, exit last.
    order: Vec<usize>,
    torn_down: bool,
    disconnect_calls: usize,
}

impl SignalChain {
    /// Build one of the two supported topologies from an options snapshot.
    ///
    /// Supplying `external` selects the suppression topology; otherwise the
    /// standard chain is built. Disabled stages are never wired — omission,
    /// not muting, preserves the single-path invariant.
    pub fn build(
        options: &ProcessingOptions,
        sample_rate: f32,
        external: Option<Box<dyn Stage>>,
    ) -> Result<SignalChain, Error> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidSampleRate(sample_rate));
        }

        let sr = sample_rate;
        let aggressive = options.aggressive();
        let mut slots: Vec<Slot> = Vec::new();

        let any_conditioning = external.is_some()
            || options.high_pass()
            || options.use_noise_gate()
            || options.use_voice_eq()
            || options.use_de_esser()
            || options.use_compressor()
            || options.use_limiter();

        // DC offset must go before anything applies gain.
        if any_conditioning {
            slots.push(Slot::DcBlocker(DcBlocker::new(sr)));
        }

        match external {
            Some(stage) => {
                if options.high_pass() {
                    let dual = if aggressive {
                        DualHighPass::aggressive(sr)
                    } else {
                        DualHighPass::standard(sr)
                    };
                    slots.push(Slot::DualHighPass(dual));
                }
                if aggressive {
                    slots.push(Slot::NotchBank(SpectralNotchBank::new(sr)));
                }
                if options.high_pass() {
                    slots.push(Slot::HighPass(HighPassFilter::new(
                        sr,
                        options.high_pass_cutoff_hz(),
                    )));
                }
                if options.use_noise_gate() {
                    slots.push(Slot::NoiseGate(DynamicsStage::noise_gate(
                        sr,
                        options.noise_gate_threshold_db(),
                        aggressive,
                    )));
                }
                slots.push(Slot::External(stage));
            }
            None => {
                if options.high_pass() {
                    if aggressive {
                        slots.push(Slot::DualHighPass(DualHighPass::aggressive(sr)));
                    } else {
                        slots.push(Slot::HighPass(HighPassFilter::new(
                            sr,
                            options.high_pass_cutoff_hz(),
                        )));
                    }
                }
                if options.use_noise_gate() {
                    slots.push(Slot::NoiseGate(DynamicsStage::noise_gate(
                        sr,
                        options.noise_gate_threshold_db(),
                        aggressive,
                    )));
                }
            }
        }

        if options.use_voice_eq() {
            slots.push(Slot::VoiceEq(VoiceEq::new(sr)));
        }
        if options.use_de_esser() {
            slots.push(Slot::DeEsser(DeEsser::new(sr)));
        }
        if options.use_compressor() {
            slots.push(Slot::Compressor(DynamicsStage::soft_compressor(sr)));
        }
        if options.use_limiter() {
            slots.push(Slot::Limiter(DynamicsStage::limiter(sr)));
        }
        // The exit stage is always present, even at unity gain.
        slots.push(Slot::OutputGain(OutputGain::new(sr, options.output_gain())));

        let order: Vec<usize> = (0..slots.len()).collect();
        debug_assert!({
            let mut kinds: Vec<StageKind> = slots.iter().map(|s| s.kind()).collect();
            kinds.sort_by_key(|k| format!("{k:?}"));
            kinds.windows(2).all(|w| w[0] != w[1])
        });

        let chain = SignalChain {
            slots,
            order,
            torn_down: false,
            disconnect_calls: 0,
        };
        log::debug!(
            "built {:?} chain: {:?}",
            options.quality(),
            chain.path()
        );
        Ok(chain)
    }

    /// The ordered stage path, entry to exit.
    pub fn path(&self) -> Vec<StageKind> {
        self.order.iter().map(|&i| self.slots[i].kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.order.iter().any(|&i| self.slots[i].kind() == kind)
    }

    #[inline]
    pub fn process_sample(&mut self, sample: f32) -> f32 {
        let mut x = sample;
        for &i in &self.order {
            x = self.slots[i].process(x);
        }
        sanitize(x)
    }

    /// Run a block through the full path in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process_sample(*s);
        }
    }

    /// Apply the current runtime knob values to the wired stages. Cheap
    /// enough for every block: stages skip redundant coefficient updates.
    pub fn apply_params(&mut self, params: &ChainParams) {
        for slot in &mut self.slots {
            match slot {
                Slot::NoiseGate(gate) => gate.set_threshold(params.gate_threshold_db.load()),
                Slot::HighPass(hpf) => hpf.set_cutoff(params.high_pass_cutoff_hz.load()),
                Slot::VoiceEq(eq) => eq.set_presence_gain(params.presence_gain_db.load()),
                Slot::Limiter(lim) => lim.set_threshold(params.limiter_threshold_db.load()),
                Slot::OutputGain(gain) => gain.set_gain(params.output_gain.load()),
                _ => {}
            }
        }
    }

    /// Disconnect every stage and clear the path. Idempotent and total: no
    /// stage outlives the chain that owned it, and repeat calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        for slot in &mut self.slots {
            slot.disconnect();
            self.disconnect_calls += 1;
        }
        self.order.clear();
        self.torn_down = true;
        log::debug!("chain torn down, {} stages disconnected", self.disconnect_calls);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Total `disconnect` calls issued by teardown (one per owned stage).
    pub fn disconnect_count(&self) -> usize {
        self.disconnect_calls
    }

    /// True if any owned stage still reports itself connected.
    pub fn any_connected(&self) -> bool {
        self.slots.iter().any(|s| s.is_connected())
    }
}

impl Drop for SignalChain {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, ProcessingOverrides, QualityTier};

    struct FakeSuppressor {
        connected: bool,
    }

    impl FakeSuppressor {
        fn new() -> Box<dyn Stage> {
            Box::new(Self { connected: true })
        }
    }

    impl Stage for FakeSuppressor {
        fn kind(&self) -> StageKind {
            StageKind::ExternalSuppression
        }

        fn process(&mut self, sample: f32) -> f32 {
            sample
        }

        fn reset(&mut self) {}

        fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[test]
    fn basic_tier_builds_a_minimal_path() {
        let opts = resolve(QualityTier::Basic);
        let chain = SignalChain::build(&opts, 48_000.0, None).unwrap();
        // All toggles off: only the mandatory exit stage remains.
        assert_eq!(chain.path(), vec![StageKind::OutputGain]);
    }

    #[test]
    fn no_stage_appears_twice_in_any_tier() {
        for tier in QualityTier::ALL {
            let opts = resolve(tier);
            for external in [false, true] {
                let ext = external.then(FakeSuppressor::new);
                let chain = SignalChain::build(&opts, 48_000.0, ext).unwrap();
                let path = chain.path();
                for kind in &path {
                    assert_eq!(
                        path.iter().filter(|k| *k == kind).count(),
                        1,
                        "{tier:?}: {kind:?} wired twice"
                    );
                }
            }
        }
    }

    #[test]
    fn disabled_stages_are_never_wired() {
        let opts = resolve(QualityTier::Professional);
        let chain = SignalChain::build(&opts, 48_000.0, None).unwrap();
        assert!(!chain.contains(StageKind::NoiseGate));
        assert!(!chain.contains(StageKind::DeEsser));
        assert!(chain.contains(StageKind::VoiceEq));
        assert!(chain.contains(StageKind::Limiter));
    }

    #[test]
    fn ultra_suppression_topology_orders_stages_as_specified() {
        let mut opts = resolve(QualityTier::Ultra);
        // Enable the gate so the full documented ordering is observable.
        let ov = ProcessingOverrides {
            use_noise_gate: Some(true),
            ..Default::default()
        };
        opts.apply(&ov).unwrap();

        let chain = SignalChain::build(&opts, 48_000.0, Some(FakeSuppressor::new())).unwrap();
        let path = chain.path();
        assert_eq!(
            path,
            vec![
                StageKind::DcBlocker,
                StageKind::DualHighPass,
                StageKind::NotchBank,
                StageKind::HighPass,
                StageKind::NoiseGate,
                StageKind::ExternalSuppression,
                StageKind::VoiceEq,
                StageKind::DeEsser,
                StageKind::Compressor,
                StageKind::Limiter,
                StageKind::OutputGain,
            ]
        );
    }

    #[test]
    fn teardown_disconnects_every_stage_exactly_once() {
        let opts = resolve(QualityTier::Ultra);
        let mut chain = SignalChain::build(&opts, 48_000.0, Some(FakeSuppressor::new())).unwrap();
        let stage_count = chain.len();

        chain.teardown();
        assert_eq!(chain.disconnect_count(), stage_count);
        assert!(!chain.any_connected());
        assert!(chain.is_empty());

        // Idempotent: a second teardown adds nothing.
        chain.teardown();
        assert_eq!(chain.disconnect_count(), stage_count);
    }

    #[test]
    fn rebuild_after_teardown_leaves_no_prior_stage_connected() {
        let opts = resolve(QualityTier::Ultra);
        let mut old = SignalChain::build(&opts, 48_000.0, Some(FakeSuppressor::new())).unwrap();
        let prior_count = old.len();
        old.teardown();

        let new_opts = resolve(QualityTier::Balanced);
        let new = SignalChain::build(&new_opts, 48_000.0, None).unwrap();

        assert_eq!(old.disconnect_count(), prior_count);
        assert!(!old.any_connected());
        assert!(new.path().iter().all(|k| *k != StageKind::ExternalSuppression));
    }

    #[test]
    fn torn_down_chain_passes_audio_through() {
        let opts = resolve(QualityTier::Professional);
        let mut chain = SignalChain::build(&opts, 48_000.0, None).unwrap();
        chain.teardown();
        assert_eq!(chain.process_sample(0.25), 0.25);
    }

    #[test]
    fn non_finite_input_is_clamped_not_propagated() {
        let opts = resolve(QualityTier::Balanced);
        let mut chain = SignalChain::build(&opts, 48_000.0, None).unwrap();
        let out = chain.process_sample(f32::NAN);
        assert!(out.is_finite());
    }

    #[test]
    fn invalid_sample_rate_is_a_construction_error() {
        let opts = resolve(QualityTier::Basic);
        assert!(matches!(
            SignalChain::build(&opts, 0.0, None),
            Err(crate::error::Error::InvalidSampleRate(_))
        ));
        let err = match SignalChain::build(&opts, f32::NAN, None) {
            Err(e) => e,
            Ok(_) => panic!("NaN sample rate accepted"),
        };
        assert!(!err.is_configuration());
    }

    #[test]
    fn runtime_params_apply_without_rebuilding() {
        let mut opts = resolve(QualityTier::Balanced);
        let ov = ProcessingOverrides {
            use_noise_gate: Some(true),
            ..Default::default()
        };
        opts.apply(&ov).unwrap();

        let mut chain = SignalChain::build(&opts, 48_000.0, None).unwrap();
        let params = crate::params::ChainParams::from_options(&opts);
        params.output_gain.store(1.8);
        params.high_pass_cutoff_hz.store(150.0);
        // Lift the gate threshold so the extreme-ratio stage leaves the
        // tone alone and the gain change stays observable.
        params.gate_threshold_db.store(0.0);
        chain.apply_params(&params);

        // Drive a passband tone (the high-pass eats DC) and compare the
        // settled amplitude against the retargeted gain.
        let mut peak = 0.0f32;
        for n in 0..48_000 {
            let x = 0.2 * (std::f32::consts::TAU * 1_000.0 * n as f32 / 48_000.0).sin();
            let y = chain.process_sample(x);
            if n > 24_000 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak > 0.3, "runtime gain update not applied: {peak}");
    }
}
