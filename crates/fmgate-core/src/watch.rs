//! Debounced configuration file watcher
//!
//! Watches the configuration file's parent directory and distinguishes
//! create, delete, and modify of the tracked file among sibling events.
//! Bursts of modifications coalesce into a single reload; the parsed
//! document ships to the actor whole, so the rule table swap is atomic
//! from the resolver's point of view.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actor::GateCommand;
use crate::config;
use crate::debounce::Coalescer;
use crate::error::GateError;

/// Window for coalescing bursts of file modifications into one reload.
pub const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watch the configuration file and feed reloads to the actor.
///
/// Runs until the actor side of `cmd_tx` goes away. Creation of a missing
/// file reloads immediately; deletion clears the rule table; modification
/// reloads after [`RELOAD_DEBOUNCE`] of quiet.
pub async fn run_config_watcher(
    path: PathBuf,
    cmd_tx: mpsc::Sender<GateCommand>,
) -> Result<(), GateError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name: OsString = path
        .file_name()
        .ok_or_else(|| {
            GateError::InvalidConfig(format!("config path has no file name: {}", path.display()))
        })?
        .to_os_string();

    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let _ = fs_tx.send(res);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("watching {} for configuration changes", path.display());

    let mut debounce = Coalescer::new(RELOAD_DEBOUNCE);
    let mut file_present = path.exists();

    loop {
        tokio::select! {
            event = fs_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("config watch error: {e}");
                        continue;
                    }
                };
                if matches!(event.kind, EventKind::Access(_)) {
                    continue;
                }
                // Sibling files in the directory are none of our business.
                if !event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()))
                {
                    continue;
                }

                let exists_now = path.exists();
                if !file_present && exists_now {
                    info!("{} created", path.display());
                    file_present = true;
                    debounce.cancel();
                    if send_reload(&path, &cmd_tx).await.is_err() {
                        break;
                    }
                } else if file_present && !exists_now {
                    info!("{} deleted", path.display());
                    file_present = false;
                    debounce.cancel();
                    if cmd_tx.send(GateCommand::RulesCleared).await.is_err() {
                        break;
                    }
                } else if exists_now {
                    debounce.poke();
                }
            }
            _ = debounce.fired() => {
                if send_reload(&path, &cmd_tx).await.is_err() {
                    break;
                }
            }
        }
    }

    debug!("config watcher stopped");
    Ok(())
}

async fn send_reload(
    path: &Path,
    cmd_tx: &mpsc::Sender<GateCommand>,
) -> Result<(), mpsc::error::SendError<GateCommand>> {
    let config = config::load(path);
    cmd_tx
        .send(GateCommand::ConfigLoaded {
            config,
            reloaded: true,
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tokio::time::{sleep, timeout};

    // A document with every key present, so loading never rewrites the file
    // and retriggers the watcher mid-test.
    fn complete_doc(tolerance: f64) -> String {
        format!(
            r#"{{"frequencies": [88.0], "tolerance": {tolerance}, "limitManualBandwidth": false, "maxManualBandwidth": 151.0, "bandwidthInterceptValue": "W", "disablePlugin": false}}"#
        )
    }

    async fn next_command(rx: &mut mpsc::Receiver<GateCommand>) -> GateCommand {
        timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("watcher event")
            .expect("channel open")
    }

    #[tokio::test]
    async fn burst_of_modifications_coalesces_into_one_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FrequencyMute.json");
        fs::write(&path, complete_doc(0.05)).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let watcher = tokio::spawn(run_config_watcher(path.clone(), tx));
        sleep(Duration::from_millis(200)).await;

        for tolerance in [0.1, 0.2, 0.3] {
            fs::write(&path, complete_doc(tolerance)).unwrap();
            sleep(Duration::from_millis(50)).await;
        }

        match next_command(&mut rx).await {
            GateCommand::ConfigLoaded { config, reloaded } => {
                assert!(reloaded);
                assert_eq!(config.tolerance, 0.3);
            }
            other => panic!("expected ConfigLoaded, got {other:?}"),
        }

        // The burst produced exactly one reload.
        sleep(Duration::from_millis(700)).await;
        assert!(rx.try_recv().is_err());

        drop(rx);
        watcher.abort();
    }

    #[tokio::test]
    async fn deleting_the_file_clears_the_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FrequencyMute.json");
        fs::write(&path, complete_doc(0.05)).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let watcher = tokio::spawn(run_config_watcher(path.clone(), tx));
        sleep(Duration::from_millis(200)).await;

        fs::remove_file(&path).unwrap();

        assert!(matches!(
            next_command(&mut rx).await,
            GateCommand::RulesCleared
        ));

        drop(rx);
        watcher.abort();
    }

    #[tokio::test]
    async fn creating_the_file_reloads_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FrequencyMute.json");

        let (tx, mut rx) = mpsc::channel(16);
        let watcher = tokio::spawn(run_config_watcher(path.clone(), tx));
        sleep(Duration::from_millis(200)).await;

        fs::write(&path, complete_doc(0.2)).unwrap();

        match next_command(&mut rx).await {
            GateCommand::ConfigLoaded { config, .. } => assert_eq!(config.tolerance, 0.2),
            other => panic!("expected ConfigLoaded, got {other:?}"),
        }

        drop(rx);
        watcher.abort();
    }

    #[tokio::test]
    async fn sibling_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("FrequencyMute.json");
        fs::write(&path, complete_doc(0.05)).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let watcher = tokio::spawn(run_config_watcher(path.clone(), tx));
        sleep(Duration::from_millis(200)).await;

        fs::write(dir.path().join("OtherPlugin.json"), "{}").unwrap();

        sleep(Duration::from_millis(800)).await;
        assert!(rx.try_recv().is_err());

        drop(rx);
        watcher.abort();
    }
}
