//! Frequency-gated audio controller daemon
//!
//! Connects to a tuner control server, watches the live tuned frequency,
//! and drives the device volume according to a user-editable frequency
//! table, mirroring the current status to connected viewers.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fmgate_core::actor::{run_gate_actor, GateCommand};
use fmgate_core::config;
use fmgate_core::link::{
    connect_ws, run_link, STATUS_RECONNECT_DELAY, TELEMETRY_RECONNECT_DELAY,
};
use fmgate_core::watch::run_config_watcher;

#[derive(Debug, Parser)]
#[command(name = "fmgate-daemon", about = "Frequency-triggered audio gain controller", version)]
struct Args {
    /// Host server configuration (startup volume and listen port)
    #[arg(long, default_value = "config.json")]
    host_config: PathBuf,

    /// Frequency table configuration file
    #[arg(long, default_value = "plugins_configs/FrequencyMute.json")]
    config: PathBuf,

    /// Tuner server URL (overrides the port from the host configuration)
    #[arg(long)]
    server_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HostConfig {
    #[serde(default)]
    audio: HostAudio,
    #[serde(default)]
    webserver: HostWebserver,
}

#[derive(Debug, Default, Deserialize)]
struct HostAudio {
    #[serde(rename = "startupVolume")]
    startup_volume: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct HostWebserver {
    #[serde(rename = "webserverPort")]
    webserver_port: Option<u16>,
}

/// Read the host environment once at startup: the baseline volume fraction
/// and the tuner server's listen port. Both are immutable for the life of
/// the process.
fn read_host_environment(path: &Path) -> (f64, u16) {
    let host: HostConfig = std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();
    let startup_volume = match host.audio.startup_volume {
        Some(v) if (0.0..=1.0).contains(&v) => v,
        Some(v) => {
            warn!("startup volume {v} outside [0, 1], using 1.0");
            1.0
        }
        None => {
            warn!("no startup volume in {}, using 1.0", path.display());
            1.0
        }
    };
    let port = host.webserver.webserver_port.unwrap_or(8080);
    (startup_volume, port)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fmgate_core=info,fmgate_daemon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("starting fmgate");

    let (startup_volume, port) = read_host_environment(&args.host_config);
    let base_url = args
        .server_url
        .unwrap_or_else(|| format!("ws://127.0.0.1:{port}"));

    if let Err(e) = config::ensure_default_file(&args.config) {
        warn!("could not create default configuration: {e}");
    }
    let initial_config = config::load(&args.config);

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = mpsc::channel(64);
    let (health_tx, health_rx) = watch::channel(true);

    tokio::spawn(run_gate_actor(
        cmd_rx,
        initial_config,
        startup_volume,
        command_tx,
        status_tx,
        health_tx,
    ));

    {
        let path = args.config.clone();
        let cmd_tx = cmd_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = run_config_watcher(path, cmd_tx).await {
                error!("config watcher failed: {e}");
            }
        });
    }

    // Telemetry in, device commands out, over the same socket.
    let telemetry_url = format!("{base_url}/text");
    tokio::spawn(run_link(
        "telemetry",
        TELEMETRY_RECONNECT_DELAY,
        move || {
            let url = telemetry_url.clone();
            async move { connect_ws(&url).await }
        },
        command_rx,
        cmd_tx.clone(),
        GateCommand::TelemetryText,
        Some(health_rx),
    ));

    // Status broadcasts out, viewer requests in.
    let status_url = format!("{base_url}/data_plugins");
    tokio::spawn(run_link(
        "status",
        STATUS_RECONNECT_DELAY,
        move || {
            let url = status_url.clone();
            async move { connect_ws(&url).await }
        },
        status_rx,
        cmd_tx.clone(),
        GateCommand::ViewerText,
        None,
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    let _ = cmd_tx.send(GateCommand::Shutdown).await;
    Ok(())
}
