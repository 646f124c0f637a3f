pub mod biquad;
pub mod de_esser;
pub mod dynamics;
pub mod gain;
pub mod high_pass;
pub mod notch_bank;
pub mod utils;
pub mod voice_eq;

pub use biquad::Biquad;
pub use de_esser::DeEsser;
pub use dynamics::DynamicsStage;
pub use gain::OutputGain;
pub use high_pass::{DcBlocker, DualHighPass, HighPassFilter};
pub use notch_bank::SpectralNotchBank;
pub use voice_eq::VoiceEq;
