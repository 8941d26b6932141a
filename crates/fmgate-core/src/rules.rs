//! Frequency rule table
//!
//! A rule pairs a center frequency (MHz) with the gain reduction to apply
//! while the tuner sits within tolerance of it. Rules come from the
//! persisted configuration and are replaced wholesale on every reload;
//! nothing mutates a loaded table in place.

use serde::Deserialize;
use tracing::warn;

use crate::status::GainStatus;

/// Gain reduction applied when a rule matches.
///
/// Config files tag rules with a single letter: `M` mute, `A`/`S`/`D`
/// attenuation levels one through three. Anything else normalizes to `M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainMode {
    /// Full mute
    Mute,
    /// Attenuation level 1 (shallowest)
    Atten1,
    /// Attenuation level 2
    Atten2,
    /// Attenuation level 3 (deepest)
    Atten3,
}

impl GainMode {
    /// Parse a one-letter config tag, case-insensitively.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "A" => GainMode::Atten1,
            "S" => GainMode::Atten2,
            "D" => GainMode::Atten3,
            _ => GainMode::Mute,
        }
    }

    /// The status a matching rule of this mode resolves to.
    pub fn status(self) -> GainStatus {
        match self {
            GainMode::Mute => GainStatus::Muted,
            GainMode::Atten1 => GainStatus::Attenuated1,
            GainMode::Atten2 => GainStatus::Attenuated2,
            GainMode::Atten3 => GainStatus::Attenuated3,
        }
    }
}

/// One entry of the active rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyRule {
    /// Center frequency in MHz
    pub freq_mhz: f64,
    /// Gain reduction to apply within tolerance of the center
    pub mode: GainMode,
}

/// A rule entry as it appears in the config file: either a bare number
/// (muted by default) or an object with an optional mode tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    Bare(f64),
    Tagged {
        freq: f64,
        #[serde(default)]
        mode: Option<String>,
    },
    Other(serde_json::Value),
}

/// Convert raw config entries into the active rule table.
///
/// Invalid entries and non-finite frequencies are dropped with a warning;
/// a bad entry never takes the rest of the table down with it.
pub fn parse_rules(entries: &[RuleEntry]) -> Vec<FrequencyRule> {
    entries
        .iter()
        .filter_map(|entry| {
            let (freq, mode) = match entry {
                RuleEntry::Bare(freq) => (*freq, GainMode::Mute),
                RuleEntry::Tagged { freq, mode } => (
                    *freq,
                    mode.as_deref()
                        .map(GainMode::from_tag)
                        .unwrap_or(GainMode::Mute),
                ),
                RuleEntry::Other(value) => {
                    warn!("ignoring invalid frequency entry: {value}");
                    return None;
                }
            };
            if !freq.is_finite() {
                warn!("ignoring non-finite frequency entry");
                return None;
            }
            Some(FrequencyRule {
                freq_mhz: freq,
                mode,
            })
        })
        .collect()
}
