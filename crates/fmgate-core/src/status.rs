//! Gain status classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// The controller's current classification of the tuned frequency.
///
/// This is the value broadcast to viewers and the input to the volume
/// command mapping. There is exactly one current status per controller,
/// and only the resolution step changes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GainStatus {
    /// Volume at the configured baseline
    #[default]
    #[serde(rename = "normal")]
    Normal,
    /// Volume forced to zero
    #[serde(rename = "muted")]
    Muted,
    /// First attenuation level
    #[serde(rename = "attenuated_1")]
    Attenuated1,
    /// Second attenuation level
    #[serde(rename = "attenuated_2")]
    Attenuated2,
    /// Third (deepest) attenuation level
    #[serde(rename = "attenuated_3")]
    Attenuated3,
}

impl fmt::Display for GainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GainStatus::Normal => "normal",
            GainStatus::Muted => "muted",
            GainStatus::Attenuated1 => "attenuated_1",
            GainStatus::Attenuated2 => "attenuated_2",
            GainStatus::Attenuated3 => "attenuated_3",
        };
        write!(f, "{name}")
    }
}
