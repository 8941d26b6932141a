//! Manual bandwidth interception
//!
//! Raw device-bound command lines are scanned here before the host forwards
//! them. The scan is advisory: the original line always flows onward
//! untouched, and the only output is an optional corrective command that
//! reverts the tuner to automatic bandwidth selection.

use tracing::info;

use crate::config::GateConfig;

/// Command that reverts the tuner to automatic bandwidth selection.
pub const AUTO_BANDWIDTH_COMMAND: &str = "W0\n";

/// Scan newline-delimited command text for a manual bandwidth change.
///
/// The first line starting with the configured prefix decides: the prefix
/// is stripped, embedded spaces removed, trailing non-digits trimmed, and
/// the remaining value read as Hz. If the value exceeds the configured cap
/// (in kHz) while limiting is enabled and the plugin active, the corrective
/// command is returned for the caller to emit.
pub fn scan(text: &str, config: &GateConfig) -> Option<String> {
    let prefix = config.bandwidth_intercept_value.as_str();
    if prefix.is_empty() {
        return None;
    }
    for line in text.split('\n') {
        let Some(rest) = line.strip_prefix(prefix) else {
            continue;
        };
        let cleaned = rest.replace(' ', "");
        let digits = cleaned.trim_end_matches(|c: char| !c.is_ascii_digit());
        if digits.is_empty() {
            return None;
        }
        let Ok(value) = digits.parse::<f64>() else {
            return None;
        };
        let khz = value / 1000.0;
        if !config.disable_plugin
            && config.limit_manual_bandwidth
            && khz > config.max_manual_bandwidth
        {
            info!("bandwidth changed by user to {khz} kHz, forcing automatic");
            return Some(AUTO_BANDWIDTH_COMMAND.to_string());
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiting_config() -> GateConfig {
        GateConfig {
            limit_manual_bandwidth: true,
            max_manual_bandwidth: 151.0,
            ..GateConfig::default()
        }
    }

    #[test]
    fn bandwidth_over_cap_triggers_corrective() {
        assert_eq!(
            scan("W200000 ", &limiting_config()),
            Some("W0\n".to_string())
        );
    }

    #[test]
    fn bandwidth_under_cap_passes() {
        assert_eq!(scan("W100000", &limiting_config()), None);
    }

    #[test]
    fn non_prefixed_lines_are_ignored() {
        assert_eq!(scan("T88000", &limiting_config()), None);
        assert_eq!(scan("Y80", &limiting_config()), None);
    }

    #[test]
    fn prefixed_line_anywhere_in_the_text_is_found() {
        assert_eq!(
            scan("T88000\nW200000\n", &limiting_config()),
            Some("W0\n".to_string())
        );
    }

    #[test]
    fn first_prefixed_line_decides() {
        // The over-cap line after the first match is never inspected.
        assert_eq!(scan("W100000\nW200000", &limiting_config()), None);
    }

    #[test]
    fn trailing_non_digits_are_trimmed() {
        assert_eq!(
            scan("W200000kHz", &limiting_config()),
            Some("W0\n".to_string())
        );
    }

    #[test]
    fn non_numeric_payload_passes() {
        assert_eq!(scan("W", &limiting_config()), None);
        assert_eq!(scan("Wabc", &limiting_config()), None);
    }

    #[test]
    fn limiting_disabled_passes_everything() {
        let config = GateConfig {
            limit_manual_bandwidth: false,
            ..limiting_config()
        };
        assert_eq!(scan("W200000", &config), None);
    }

    #[test]
    fn disabled_plugin_passes_everything() {
        let config = GateConfig {
            disable_plugin: true,
            ..limiting_config()
        };
        assert_eq!(scan("W200000", &config), None);
    }
}
