//! Shared DSP math helpers.

/// Floor used before log conversions to keep dB math finite.
pub const DB_EPS: f32 = 1e-10;

#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    20.0 * lin.max(DB_EPS).log10()
}

/// One-pole smoothing coefficient for a time constant given in milliseconds.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = (time_ms * 0.001 * sample_rate).max(1.0);
    (-1.0 / samples).exp()
}

/// Clamp a possibly non-finite sample to a safe value.
///
/// A momentary NaN or runaway value from an edge-case division must never
/// reach the output; a clamped tick is always preferable to a dropped one.
#[inline]
pub fn sanitize(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(-4.0, 4.0)
    } else {
        0.0
    }
}
