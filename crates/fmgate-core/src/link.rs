//! Resilient WebSocket links
//!
//! One link per channel: the telemetry/command link consumes tuner
//! telemetry and carries device commands, the status link publishes to
//! viewers. Both run the same state machine, Closed -> Connecting -> Open
//! -> Closed, with a fixed reconnect delay and exactly one connection
//! attempt in flight. The link is generic over its connector and socket so
//! the machine is testable without a real server.
//!
//! Delivery is fire-and-forget: outbound messages arriving while the link
//! is down are dropped with a warning, and the next state change re-emits
//! naturally once the link reopens.

use std::future::Future;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::actor::GateCommand;
use crate::debounce::Coalescer;

/// Reconnect delay for the telemetry/command link.
pub const TELEMETRY_RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Reconnect delay for the viewer-status link.
pub const STATUS_RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// How long the upstream transport may stay unhealthy before the link
/// force-closes and lets the reconnect path re-establish.
const UNHEALTHY_GRACE: Duration = Duration::from_secs(10);

/// A live WebSocket connection to the tuner server.
pub type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a WebSocket to the tuner server. The production connector for
/// [`run_link`].
pub async fn connect_ws(
    url: &str,
) -> Result<WsSocket, tokio_tungstenite::tungstenite::Error> {
    let (socket, _) = connect_async(url).await?;
    Ok(socket)
}

enum SocketEnd {
    /// Connection lost; reconnect after the backoff delay.
    Lost,
    /// Outbound channel closed or actor gone; stop the link for good.
    Shutdown,
}

/// Run one resilient link until shutdown.
///
/// `connect` is called for each attempt and must yield a fresh socket.
/// Inbound text frames are wrapped with `wrap` and forwarded to the actor;
/// messages on `outbound_rx` are written to the socket. `health_rx`, when
/// present, feeds the liveness watchdog: a transition to unhealthy arms a
/// 10 s timer, recovery cancels it, and expiry with health still bad
/// recycles the connection.
pub async fn run_link<S, E, C, Fut, W>(
    name: &'static str,
    reconnect_delay: Duration,
    mut connect: C,
    mut outbound_rx: mpsc::Receiver<String>,
    inbound_tx: mpsc::Sender<GateCommand>,
    wrap: W,
    mut health_rx: Option<watch::Receiver<bool>>,
) where
    S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Unpin,
    E: std::fmt::Display,
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<S, E>>,
    W: Fn(String) -> GateCommand,
{
    loop {
        let socket = match connect().await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("{name} link connect failed: {e}");
                if backoff(name, reconnect_delay, &mut outbound_rx).await.is_err() {
                    return;
                }
                continue;
            }
        };
        info!("{name} link open");

        match drive(name, socket, &mut outbound_rx, &inbound_tx, &wrap, health_rx.as_mut()).await {
            SocketEnd::Shutdown => return,
            SocketEnd::Lost => {
                if backoff(name, reconnect_delay, &mut outbound_rx).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Sit out the reconnect delay. Outbound messages arriving meanwhile are
/// dropped; Err means the outbound channel closed and the link should stop.
async fn backoff(
    name: &str,
    delay: Duration,
    outbound_rx: &mut mpsc::Receiver<String>,
) -> Result<(), ()> {
    let wait = tokio::time::sleep(delay);
    tokio::pin!(wait);
    loop {
        tokio::select! {
            _ = &mut wait => return Ok(()),
            msg = outbound_rx.recv() => match msg {
                Some(_) => warn!("{name} link down, dropping outbound message"),
                None => return Err(()),
            }
        }
    }
}

/// Drive one open socket until it dies or the link is asked to stop.
async fn drive<S, E, W>(
    name: &str,
    mut socket: S,
    outbound_rx: &mut mpsc::Receiver<String>,
    inbound_tx: &mpsc::Sender<GateCommand>,
    wrap: &W,
    mut health_rx: Option<&mut watch::Receiver<bool>>,
) -> SocketEnd
where
    S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Unpin,
    E: std::fmt::Display,
    W: Fn(String) -> GateCommand,
{
    let mut watchdog = Coalescer::new(UNHEALTHY_GRACE);
    // The transport may already be unhealthy when this socket opens.
    if let Some(false) = health_rx.as_deref().map(|rx| *rx.borrow()) {
        watchdog.poke();
    }

    loop {
        tokio::select! {
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if inbound_tx.send(wrap(text)).await.is_err() {
                        return SocketEnd::Shutdown;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("{name} link closed by peer");
                    return SocketEnd::Lost;
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to forward
                Some(Err(e)) => {
                    warn!("{name} link error: {e}");
                    return SocketEnd::Lost;
                }
            },
            msg = outbound_rx.recv() => match msg {
                Some(text) => {
                    if let Err(e) = socket.send(Message::Text(text)).await {
                        warn!("{name} link send failed: {e}");
                        return SocketEnd::Lost;
                    }
                }
                None => {
                    let _ = socket.close().await;
                    return SocketEnd::Shutdown;
                }
            },
            healthy = health_transition(&mut health_rx) => {
                if healthy {
                    debug!("{name} upstream transport healthy again");
                    watchdog.cancel();
                } else {
                    debug!("{name} upstream transport unhealthy, arming recycle timer");
                    watchdog.poke();
                }
            }
            _ = watchdog.fired() => {
                // Re-check at expiry; health may have recovered without a
                // transition we saw.
                let still_unhealthy = health_rx
                    .as_deref()
                    .map(|rx| !*rx.borrow())
                    .unwrap_or(false);
                if still_unhealthy {
                    info!(
                        "{name} upstream transport unhealthy for {}s, recycling link",
                        UNHEALTHY_GRACE.as_secs()
                    );
                    let _ = socket.close().await;
                    return SocketEnd::Lost;
                }
            }
        }
    }
}

/// Resolve with the new health value on the next transition. Pends forever
/// when no health source is attached or the source has gone away.
async fn health_transition(rx: &mut Option<&mut watch::Receiver<bool>>) -> bool {
    match rx {
        Some(rx) => {
            if rx.changed().await.is_ok() {
                *rx.borrow_and_update()
            } else {
                std::future::pending().await
            }
        }
        None => std::future::pending().await,
    }
}
