//! Frequency-gated audio control engine
//!
//! Watches a live tuning-frequency feed and decides whether the tuned
//! station should be muted, attenuated, or left at normal volume according
//! to a user-editable frequency table, emitting the matching volume command
//! to the device and mirroring the result to connected viewers.
//!
//! # Architecture
//!
//! All mutable state lives in a single controller actor
//! ([`actor::run_gate_actor`]) fed over a command channel. Two resilient
//! WebSocket links ([`link::run_link`]) bridge the actor to the tuner
//! server: one consumes telemetry and carries device commands, the other
//! publishes status to viewers. A notify-based watcher
//! ([`watch::run_config_watcher`]) hot-reloads the frequency table with a
//! debounce, shipping each parsed document to the actor whole so the rule
//! table swap is atomic.
//!
//! The resolution core ([`resolver`], [`rules`], [`volume`], [`guard`]) is
//! pure and synchronous; everything asynchronous sits at the edges.

pub mod actor;
pub mod config;
pub mod debounce;
pub mod error;
pub mod guard;
pub mod link;
pub mod resolver;
pub mod rules;
pub mod status;
pub mod volume;
pub mod watch;
pub mod wire;

// Re-export actor types
pub use actor::{run_gate_actor, GateCommand};

// Re-export configuration types
pub use config::{ensure_default_file, GateConfig};
pub use error::GateError;

// Re-export link entry points
pub use link::{connect_ws, run_link, STATUS_RECONNECT_DELAY, TELEMETRY_RECONNECT_DELAY};

// Re-export the resolution core
pub use resolver::{resolve, round_mhz};
pub use rules::{parse_rules, FrequencyRule, GainMode};
pub use status::GainStatus;
pub use volume::{volume_command, VolumeEmitter};
