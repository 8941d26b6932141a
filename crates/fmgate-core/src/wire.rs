//! Wire formats for the telemetry and viewer-status channels
//!
//! Both channels carry JSON text frames. The telemetry stream is owned by
//! the tuner server and only the fields named here are consumed; everything
//! else in a frame is ignored.

use serde::Deserialize;

use crate::status::GainStatus;

/// Message type tag on outbound status broadcasts.
pub const STATUS_TYPE: &str = "frequency-mute";

/// Message type tag a viewer sends to request an immediate status resend.
pub const REQUEST_STATUS_TYPE: &str = "frequency-mute-request-status";

/// One frame of tuner telemetry.
///
/// The serialport fields mirror the tuner server's transport health and
/// feed the liveness watchdog when present.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryFrame {
    /// Currently tuned frequency in MHz
    pub freq: Option<f64>,
    #[serde(rename = "isSerialportAlive")]
    pub serialport_alive: Option<bool>,
    #[serde(rename = "isSerialportRetrying")]
    pub serialport_retrying: Option<bool>,
}

/// Control message received on the viewer-status channel.
#[derive(Debug, Deserialize)]
pub struct ViewerMessage {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Serialize the status broadcast sent to viewers.
pub fn status_message(status: GainStatus, frequency: f64) -> String {
    serde_json::json!({
        "type": STATUS_TYPE,
        "value": {
            "status": status,
            "frequency": frequency,
        },
    })
    .to_string()
}
