//! Volume command emission
//!
//! Translates a gain status into the device's textual volume command and
//! gates redundant or disabled emissions. The command scale is 0-100;
//! attenuation levels divide the baseline volume rather than subtracting
//! from it, so a quiet baseline stays proportionally quiet.

use crate::status::GainStatus;

/// Build the `Y<percent>` volume command for a status.
///
/// `startup_volume` is the host's baseline volume as a fraction in `[0, 1]`.
pub fn volume_command(status: GainStatus, startup_volume: f64) -> String {
    let percent = match status {
        GainStatus::Muted => 0.0,
        GainStatus::Attenuated1 => startup_volume / 1.1 * 100.0,
        GainStatus::Attenuated2 => startup_volume / 1.15 * 100.0,
        GainStatus::Attenuated3 => startup_volume / 1.2 * 100.0,
        GainStatus::Normal => startup_volume * 100.0,
    };
    format!("Y{}\n", percent.round() as i64)
}

/// Stateful emitter that suppresses duplicate and disabled emissions.
#[derive(Debug)]
pub struct VolumeEmitter {
    startup_volume: f64,
    last_sent: Option<GainStatus>,
}

impl VolumeEmitter {
    pub fn new(startup_volume: f64) -> Self {
        Self {
            startup_volume,
            last_sent: None,
        }
    }

    /// Produce the command to emit for `status`, or `None` when gated.
    ///
    /// Two gates apply: while `disabled`, nothing is emitted unless
    /// `force` is set; and a status equal to the last emission is never
    /// re-sent. `force` bypasses only the disable gate — the change gate
    /// always holds, which is what makes the forced return to baseline
    /// on a runtime disable a one-shot.
    pub fn apply(&mut self, status: GainStatus, disabled: bool, force: bool) -> Option<String> {
        if disabled && !force {
            return None;
        }
        if self.last_sent == Some(status) {
            return None;
        }
        self.last_sent = Some(status);
        Some(volume_command(status, self.startup_volume))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_mapping_at_baseline_0_8() {
        assert_eq!(volume_command(GainStatus::Muted, 0.8), "Y0\n");
        assert_eq!(volume_command(GainStatus::Attenuated1, 0.8), "Y73\n");
        assert_eq!(volume_command(GainStatus::Attenuated2, 0.8), "Y70\n");
        assert_eq!(volume_command(GainStatus::Attenuated3, 0.8), "Y67\n");
        assert_eq!(volume_command(GainStatus::Normal, 0.8), "Y80\n");
    }

    #[test]
    fn full_baseline_rounds_to_whole_percent() {
        assert_eq!(volume_command(GainStatus::Normal, 1.0), "Y100\n");
        assert_eq!(volume_command(GainStatus::Attenuated1, 1.0), "Y91\n");
    }

    #[test]
    fn repeated_status_emits_once() {
        let mut emitter = VolumeEmitter::new(0.8);
        assert_eq!(emitter.apply(GainStatus::Muted, false, false), Some("Y0\n".into()));
        assert_eq!(emitter.apply(GainStatus::Muted, false, false), None);
        assert_eq!(emitter.apply(GainStatus::Normal, false, false), Some("Y80\n".into()));
    }

    #[test]
    fn disabled_suppresses_all_statuses() {
        let mut emitter = VolumeEmitter::new(0.8);
        for status in [
            GainStatus::Normal,
            GainStatus::Muted,
            GainStatus::Attenuated1,
            GainStatus::Attenuated2,
            GainStatus::Attenuated3,
        ] {
            assert_eq!(emitter.apply(status, true, false), None);
        }
    }

    #[test]
    fn force_bypasses_disable_gate_exactly_once() {
        let mut emitter = VolumeEmitter::new(0.8);
        // Plugin active, station muted.
        assert!(emitter.apply(GainStatus::Muted, false, false).is_some());
        // Disabled at runtime: forced return to baseline fires once...
        assert_eq!(
            emitter.apply(GainStatus::Normal, true, true),
            Some("Y80\n".into())
        );
        // ...and a repeat of the forced return stays quiet.
        assert_eq!(emitter.apply(GainStatus::Normal, true, true), None);
    }
}
