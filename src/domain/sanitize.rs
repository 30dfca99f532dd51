/// Largest magnitude accepted from the sensor path. Anything beyond this is
/// a glitch, not a reading.
pub const SANE_LIMIT: f64 = 1e8;

/// Clamp a reading to something safe to display and integrate.
///
/// NaN, infinities and out-of-range magnitudes all collapse to 0; everything
/// else passes through unchanged.
pub fn sanitize(x: f64) -> f64 {
    if x.is_finite() && x.abs() <= SANE_LIMIT {
        x
    } else {
        0.0
    }
}
