//! Persisted configuration
//!
//! The frequency table and tuning parameters live in a JSON file owned by
//! the user. Loading is forgiving: a missing or unparseable file falls back
//! to safe defaults, and a document missing keys is healed in place so the
//! on-disk schema keeps up with the code without user intervention.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::GateError;
use crate::rules::RuleEntry;

/// Match window applied when the document names none (MHz).
pub const DEFAULT_TOLERANCE: f64 = 0.05;
/// Manual bandwidth cap applied when the document names none (kHz).
pub const DEFAULT_MAX_MANUAL_BANDWIDTH: f64 = 151.0;
/// Prefix of bandwidth commands in the raw device stream.
pub const DEFAULT_INTERCEPT_PREFIX: &str = "W";

/// Controller configuration as persisted on disk.
///
/// The active rule table is derived from `frequencies` and replaced
/// wholesale whenever a new document is installed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Frequency rule entries, scanned in listed order
    #[serde(default)]
    pub frequencies: Vec<RuleEntry>,
    /// Symmetric match window around each rule frequency (MHz)
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Cap manual bandwidth selection at `max_manual_bandwidth`
    #[serde(default)]
    pub limit_manual_bandwidth: bool,
    /// Manual bandwidth cap (kHz)
    #[serde(default = "default_max_manual_bandwidth")]
    pub max_manual_bandwidth: f64,
    /// Prefix identifying bandwidth commands in the raw device stream
    #[serde(default = "default_intercept_prefix")]
    pub bandwidth_intercept_value: String,
    /// Suspend all emissions (forced baseline restores excepted)
    #[serde(default)]
    pub disable_plugin: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            frequencies: Vec::new(),
            tolerance: DEFAULT_TOLERANCE,
            limit_manual_bandwidth: false,
            max_manual_bandwidth: DEFAULT_MAX_MANUAL_BANDWIDTH,
            bandwidth_intercept_value: DEFAULT_INTERCEPT_PREFIX.to_string(),
            disable_plugin: false,
        }
    }
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_max_manual_bandwidth() -> f64 {
    DEFAULT_MAX_MANUAL_BANDWIDTH
}

fn default_intercept_prefix() -> String {
    DEFAULT_INTERCEPT_PREFIX.to_string()
}

/// Defaults used to heal documents with missing top-level keys.
fn default_entries() -> [(&'static str, Value); 6] {
    [
        ("frequencies", json!([])),
        ("tolerance", json!(DEFAULT_TOLERANCE)),
        ("limitManualBandwidth", json!(false)),
        ("maxManualBandwidth", json!(DEFAULT_MAX_MANUAL_BANDWIDTH)),
        ("bandwidthInterceptValue", json!(DEFAULT_INTERCEPT_PREFIX)),
        ("disablePlugin", json!(false)),
    ]
}

/// Load the configuration, falling back to defaults on any failure.
///
/// A broken document costs the rule table, never the process.
pub fn load(path: &Path) -> GateConfig {
    match try_load(path) {
        Ok(config) => config,
        Err(e) => {
            error!(
                "failed to load {}: {e}; using defaults with an empty rule table",
                path.display()
            );
            GateConfig::default()
        }
    }
}

fn try_load(path: &Path) -> Result<GateConfig, GateError> {
    let raw = fs::read_to_string(path)?;
    let mut doc: Value = serde_json::from_str(&raw)?;
    let added = heal(&mut doc)?;
    let mut config: GateConfig = serde_json::from_value(doc.clone())?;
    if !added.is_empty() {
        info!("added missing settings {added:?} to {}", path.display());
        save(path, &doc)?;
    }
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        warn!(
            "tolerance {} is invalid, using {DEFAULT_TOLERANCE}",
            config.tolerance
        );
        config.tolerance = DEFAULT_TOLERANCE;
    }
    Ok(config)
}

/// Fill missing top-level keys from defaults. Returns the added key names.
fn heal(doc: &mut Value) -> Result<Vec<&'static str>, GateError> {
    let Some(map) = doc.as_object_mut() else {
        return Err(GateError::InvalidConfig(
            "top-level value is not an object".into(),
        ));
    };
    let mut added = Vec::new();
    for (key, default) in default_entries() {
        if !map.contains_key(key) {
            map.insert(key.to_string(), default);
            added.push(key);
        }
    }
    Ok(added)
}

/// Write a configuration document to disk.
pub fn save(path: &Path, doc: &Value) -> Result<(), GateError> {
    fs::write(path, render(doc)?)?;
    Ok(())
}

/// Render a document with rule objects collapsed back onto single lines,
/// keeping hand-edited frequency tables readable after a rewrite.
pub fn render(doc: &Value) -> Result<String, GateError> {
    let pretty = serde_json::to_string_pretty(doc)?;
    let rule_object = Regex::new(r#"\{\s*"freq":\s*([^,]+),\s*"mode":\s*"([^"]*)"\s*\}"#)
        .expect("static pattern compiles");
    Ok(rule_object
        .replace_all(&pretty, r#"{"freq": $1, "mode": "$2"}"#)
        .into_owned())
}

/// Create the configuration file with a documented example table if it does
/// not exist yet. Returns whether a file was created.
pub fn ensure_default_file(path: &Path) -> Result<bool, GateError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            info!("creating configuration directory {}", dir.display());
            fs::create_dir_all(dir)?;
        }
    }
    info!("creating default configuration at {}", path.display());
    let example = json!({
        "frequencies": [
            88.0,
            {"freq": 88.1, "mode": "A"},
            {"freq": 88.2, "mode": "S"},
            {"freq": 88.3, "mode": "D"}
        ],
        "tolerance": DEFAULT_TOLERANCE,
        "limitManualBandwidth": false,
        "maxManualBandwidth": DEFAULT_MAX_MANUAL_BANDWIDTH,
        "bandwidthInterceptValue": DEFAULT_INTERCEPT_PREFIX,
        "disablePlugin": false
    });
    save(path, &example)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{parse_rules, GainMode};

    fn config_file(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("FrequencyMute.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_keys_heal_to_defaults_and_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, r#"{"frequencies": [88.0]}"#);

        let config = load(&path);
        assert_eq!(config.tolerance, 0.05);
        assert!(!config.limit_manual_bandwidth);
        assert_eq!(config.max_manual_bandwidth, 151.0);
        assert_eq!(config.bandwidth_intercept_value, "W");
        assert!(!config.disable_plugin);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("\"tolerance\": 0.05"));
        assert!(rewritten.contains("\"disablePlugin\": false"));
    }

    #[test]
    fn healing_keeps_rule_objects_on_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, r#"{"frequencies": [88.0, {"freq": 88.1, "mode": "A"}]}"#);

        load(&path);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(r#"{"freq": 88.1, "mode": "A"}"#));
    }

    #[test]
    fn complete_document_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let original = r#"{"frequencies": [], "tolerance": 0.1, "limitManualBandwidth": true, "maxManualBandwidth": 120.0, "bandwidthInterceptValue": "W", "disablePlugin": false}"#;
        let path = config_file(&dir, original);

        let config = load(&path);
        assert_eq!(config.tolerance, 0.1);
        assert!(config.limit_manual_bandwidth);
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn explicit_zero_tolerance_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(
            &dir,
            r#"{"frequencies": [], "tolerance": 0.0, "limitManualBandwidth": false, "maxManualBandwidth": 151.0, "bandwidthInterceptValue": "W", "disablePlugin": false}"#,
        );
        assert_eq!(load(&path).tolerance, 0.0);
    }

    #[test]
    fn negative_tolerance_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, r#"{"frequencies": [], "tolerance": -1.0}"#);
        assert_eq!(load(&path).tolerance, 0.05);
    }

    #[test]
    fn unparseable_document_falls_back_to_empty_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, "{ not json");

        let config = load(&path);
        assert!(config.frequencies.is_empty());
        assert_eq!(config.tolerance, 0.05);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.json"));
        assert!(config.frequencies.is_empty());
        assert_eq!(config.tolerance, 0.05);
    }

    #[test]
    fn non_object_document_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file(&dir, "[1, 2, 3]");
        let config = load(&path);
        assert!(config.frequencies.is_empty());
    }

    #[test]
    fn default_file_documents_all_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins_configs").join("FrequencyMute.json");

        assert!(ensure_default_file(&path).unwrap());
        assert!(!ensure_default_file(&path).unwrap());

        let config = load(&path);
        let rules = parse_rules(&config.frequencies);
        let modes: Vec<_> = rules.iter().map(|r| r.mode).collect();
        assert_eq!(
            modes,
            vec![
                GainMode::Mute,
                GainMode::Atten1,
                GainMode::Atten2,
                GainMode::Atten3
            ]
        );

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains(r#"{"freq": 88.1, "mode": "A"}"#));
    }
}
