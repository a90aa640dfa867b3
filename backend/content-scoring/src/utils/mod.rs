// Numeric helpers shared by the scoring components

use chrono::{DateTime, Utc};
use std::f64::consts::LN_2;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Half-life decay: exp(-ln2 * t / half_life)
///
/// Equals 1.0 at t = 0 and 0.5 at t = half_life. Negative `t` is treated as 0
/// so the factor always stays in (0, 1].
pub fn half_life_decay(t: f64, half_life: f64) -> f64 {
    (-LN_2 * t.max(0.0) / half_life).exp()
}

/// Saturation transform 1 - exp(-x), bounded in [0, 1) for x >= 0
pub fn saturate(x: f64) -> f64 {
    1.0 - (-x).exp()
}

/// Fractional days elapsed from `earlier` to `later` (negative if reversed)
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / MILLIS_PER_DAY
}
