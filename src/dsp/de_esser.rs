//! De-esser: a fixed high-shelf cut to tame sibilance.
//!
//! Coarser than a true dynamic de-esser, but a static shelf costs nothing on
//! the hot path and stays inside the pipeline's latency budget.

use crate::chain::{Stage, StageKind};
use crate::dsp::biquad::Biquad;

const SHELF_HZ: f32 = 6000.0;
const SHELF_GAIN_DB: f32 = -3.0;
const SHELF_Q: f32 = 0.7;

pub struct DeEsser {
    shelf: Biquad,
    connected: bool,
}

impl DeEsser {
    pub fn new(sample_rate: f32) -> Self {
        let mut shelf = Biquad::identity();
        shelf.set_high_shelf(SHELF_HZ, SHELF_Q, SHELF_GAIN_DB, sample_rate);
        Self {
            shelf,
            connected: true,
        }
    }
}

impl Stage for DeEsser {
    fn kind(&self) -> StageKind {
        StageKind::DeEsser
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        self.shelf.process(x)
    }

    fn reset(&mut self) {
        self.shelf.clear_state();
    }

    fn disconnect(&mut self) {
        self.shelf.clear_state();
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
