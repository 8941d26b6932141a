//! Frequency-to-status resolution
//!
//! Pure functions only: the same inputs always produce the same status,
//! and nothing here touches I/O or shared state.

use crate::rules::FrequencyRule;
use crate::status::GainStatus;

/// Fixed slack added to the tolerance window to absorb floating-point
/// noise in rounded tuner readings.
pub const TOLERANCE_EPSILON: f64 = 0.001;

/// Round a frequency reading to two decimal places (10 kHz steps).
pub fn round_mhz(freq: f64) -> f64 {
    (freq * 100.0).round() / 100.0
}

/// Classify a rounded frequency against the rule table.
///
/// Rules are scanned in table order and the first one within
/// `tolerance + TOLERANCE_EPSILON` of the frequency wins. First match,
/// not closest match: when windows overlap, the earlier listed rule is
/// the deliberate tie-break. No match resolves to [`GainStatus::Normal`].
pub fn resolve(freq_rounded: f64, rules: &[FrequencyRule], tolerance: f64) -> GainStatus {
    for rule in rules {
        if (freq_rounded - rule.freq_mhz).abs() <= tolerance + TOLERANCE_EPSILON {
            return rule.mode.status();
        }
    }
    GainStatus::Normal
}
