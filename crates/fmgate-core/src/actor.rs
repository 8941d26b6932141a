//! Gate controller actor
//!
//! All mutable controller state lives in this actor: the active rule
//! table, the tuning state, the current status, and the emission gates.
//! Links, the config watcher, and the daemon talk to it exclusively
//! through [`GateCommand`] messages, so a configuration swap is atomic
//! from the resolver's point of view and no resolution ever sees a
//! half-updated table.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::GateConfig;
use crate::guard;
use crate::resolver::{resolve, round_mhz};
use crate::rules::{parse_rules, FrequencyRule, GainMode};
use crate::status::GainStatus;
use crate::volume::VolumeEmitter;
use crate::wire::{self, TelemetryFrame, ViewerMessage};

/// Commands sent to the gate actor
#[derive(Debug)]
pub enum GateCommand {
    /// Text frame received on the telemetry/command link
    TelemetryText(String),
    /// Text frame received on the viewer-status link
    ViewerText(String),
    /// A configuration document finished loading
    ConfigLoaded {
        /// The complete parsed document, installed wholesale
        config: GateConfig,
        /// False for the startup load, true for watcher reloads
        reloaded: bool,
    },
    /// The configuration file was deleted; drop all rules, keep settings
    RulesCleared,
    /// Stop the actor
    Shutdown,
}

/// Internal state for the gate actor
struct GateActorState {
    config: GateConfig,
    rules: Vec<FrequencyRule>,
    emitter: VolumeEmitter,
    status: GainStatus,
    /// Tuned frequency, rounded to two decimals
    current_freq: f64,
    /// Previous rounded frequency, for telemetry deduplication
    previous_freq: f64,
    /// Device volume/bandwidth commands, carried by the telemetry link
    command_tx: mpsc::Sender<String>,
    /// Status broadcasts for viewers
    status_tx: mpsc::Sender<String>,
    /// Upstream transport health, feeding the link watchdog
    health_tx: watch::Sender<bool>,
}

/// Run the gate controller actor.
///
/// Processes commands until [`GateCommand::Shutdown`] arrives or every
/// sender is gone.
pub async fn run_gate_actor(
    mut cmd_rx: mpsc::Receiver<GateCommand>,
    initial_config: GateConfig,
    startup_volume: f64,
    command_tx: mpsc::Sender<String>,
    status_tx: mpsc::Sender<String>,
    health_tx: watch::Sender<bool>,
) {
    let mut state = GateActorState {
        config: GateConfig::default(),
        rules: Vec::new(),
        emitter: VolumeEmitter::new(startup_volume),
        status: GainStatus::Normal,
        current_freq: 0.0,
        previous_freq: 0.0,
        command_tx,
        status_tx,
        health_tx,
    };
    state.install_config(initial_config, false);
    info!("gate actor started");

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            GateCommand::TelemetryText(text) => state.on_telemetry_text(&text).await,
            GateCommand::ViewerText(text) => state.on_viewer_text(&text).await,
            GateCommand::ConfigLoaded { config, reloaded } => {
                state.on_config_loaded(config, reloaded).await;
            }
            GateCommand::RulesCleared => {
                info!("configuration deleted, clearing rule table");
                state.rules.clear();
            }
            GateCommand::Shutdown => break,
        }
    }

    info!("gate actor stopped");
}

impl GateActorState {
    /// Swap in a freshly parsed configuration, wholesale.
    fn install_config(&mut self, config: GateConfig, reloaded: bool) {
        let rules = parse_rules(&config.frequencies);
        let muted = rules.iter().filter(|r| r.mode == GainMode::Mute).count();
        info!(
            "{} {muted} muted, {} attenuated frequencies (tolerance \u{00b1}{} MHz)",
            if reloaded { "reloaded" } else { "loaded" },
            rules.len() - muted,
            config.tolerance
        );
        self.rules = rules;
        self.config = config;
    }

    async fn on_config_loaded(&mut self, config: GateConfig, reloaded: bool) {
        self.install_config(config, reloaded);
        // A config edit takes effect immediately, even with the tuner
        // parked on one station.
        if !reloaded || self.current_freq <= 0.0 {
            return;
        }
        if self.config.disable_plugin {
            // One-shot forced return to baseline while the plugin is off.
            self.status = GainStatus::Normal;
            if let Some(cmd) = self.emitter.apply(GainStatus::Normal, true, true) {
                self.send_command(cmd).await;
            }
            self.broadcast(true).await;
        } else {
            self.recheck(true).await;
        }
    }

    async fn on_telemetry_text(&mut self, text: &str) {
        let frame: TelemetryFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(_) => {
                // Not a telemetry frame; the link also carries raw
                // device-bound command lines, which the bandwidth guard
                // inspects as they pass.
                if let Some(corrective) = guard::scan(text, &self.config) {
                    self.send_command(corrective).await;
                }
                return;
            }
        };
        self.publish_health(&frame);

        let Some(freq) = frame.freq else { return };
        if !freq.is_finite() {
            debug!("dropping non-finite frequency reading");
            return;
        }
        let rounded = round_mhz(freq);
        self.current_freq = rounded;
        if rounded == self.previous_freq {
            return;
        }
        self.recheck(false).await;
        self.previous_freq = rounded;
    }

    async fn on_viewer_text(&mut self, text: &str) {
        match serde_json::from_str::<ViewerMessage>(text) {
            Ok(msg) if msg.kind == wire::REQUEST_STATUS_TYPE => {
                debug!("viewer requested current status");
                self.broadcast(false).await;
            }
            Ok(_) => {} // other plugin traffic on the shared channel
            Err(e) => debug!("unparseable viewer message: {e}"),
        }
    }

    /// Resolve the current frequency against the active table, emit the
    /// matching volume command, and broadcast on change.
    async fn recheck(&mut self, always_broadcast: bool) {
        let status = resolve(self.current_freq, &self.rules, self.config.tolerance);
        let changed = status != self.status;
        self.status = status;
        if let Some(cmd) = self.emitter.apply(status, self.config.disable_plugin, false) {
            self.send_command(cmd).await;
        }
        if changed || always_broadcast {
            self.broadcast(false).await;
        }
    }

    async fn broadcast(&self, force: bool) {
        if self.config.disable_plugin && !force {
            return;
        }
        let msg = wire::status_message(self.status, self.current_freq);
        if self.status_tx.send(msg).await.is_err() {
            warn!("status channel closed, dropping broadcast");
        }
    }

    async fn send_command(&self, cmd: String) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!("command channel closed, dropping command");
        }
    }

    fn publish_health(&self, frame: &TelemetryFrame) {
        if frame.serialport_alive.is_none() && frame.serialport_retrying.is_none() {
            return;
        }
        let healthy =
            frame.serialport_alive.unwrap_or(true) && !frame.serialport_retrying.unwrap_or(false);
        self.health_tx.send_if_modified(|current| {
            if *current != healthy {
                *current = healthy;
                true
            } else {
                false
            }
        });
    }
}
