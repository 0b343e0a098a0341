//! pumpbus-core: Core traits, types, and error definitions for pumpbus.
//!
//! This crate defines the protocol-agnostic abstractions the pumpbus engine
//! is built on. Applications and adapter layers (MQTT, consoles, dashboards)
//! depend on these types without pulling in the serial transport or the
//! Pentair wire driver.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`PumpCommand`] / [`PumpMode`] -- the collaborator-facing command vocabulary
//! - [`PumpStatus`] -- the last-known pump status snapshot
//! - [`EngineEvent`] -- asynchronous state change notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod events;
pub mod stats;
pub mod status;
pub mod transport;
pub mod types;

// Re-export key types at crate root for ergonomic `use pumpbus_core::*`.
pub use error::{Error, Result};
pub use events::EngineEvent;
pub use stats::LinkStats;
pub use status::PumpStatus;
pub use transport::Transport;
pub use types::{ControlMode, PumpCommand, PumpMode, RunAction};
