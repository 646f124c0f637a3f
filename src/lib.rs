//! Real-time microphone conditioning with voice activity detection.
//!
//! The pipeline takes raw microphone samples, runs them through a
//! preset-driven chain of filter and dynamics stages, and hands the result
//! to the caller's transport. A parallel frequency-domain VAD engine
//! classifies the same stream as speaking or silent with hysteresis, plus a
//! 0–100 voice-level metric for UI metering.
//!
//! Entry point: [`MicConditioner::new`] builds the audio-side conditioner
//! and a [`ControlHandle`] for the UI/event context. The audio side is
//! bounded-time and allocation-free per block; all control traffic crosses
//! over through atomic parameter cells or SPSC state-swap rings.
//!
//! ```no_run
//! use clearvoice::{resolve, MicConditioner, QualityTier, SourceInfo};
//!
//! let source = SourceInfo { channels: 1, sample_rate: 48_000.0 };
//! let options = resolve(QualityTier::Professional);
//! let (mut conditioner, mut handle) = MicConditioner::new(source, options, None)?;
//!
//! // Audio callback:
//! let mut block = [0.0f32; 256];
//! conditioner.process_block(&mut block, 0);
//!
//! // Control context:
//! handle.set_output_gain(1.5)?;
//! # Ok::<(), clearvoice::Error>(())
//! ```

pub mod chain;
pub mod config;
pub mod dsp;
pub mod error;
pub mod params;
pub mod processor;
pub mod vad;

pub use chain::{SignalChain, Stage, StageKind};
pub use config::{resolve, ProcessingOptions, ProcessingOverrides, QualityTier};
pub use error::Error;
pub use processor::{ControlHandle, MicConditioner};
pub use vad::{Classification, SourceInfo, VadEngine};
