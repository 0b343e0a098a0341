//! Asynchronous engine event types.
//!
//! Events are emitted by the protocol engine through a
//! `tokio::sync::broadcast` channel when link state changes. MQTT bridges,
//! dashboards, and telemetry collectors subscribe to these events instead of
//! polling the status snapshot. Delivery is best-effort through a bounded
//! channel; slow consumers may miss events under load.

use crate::status::PumpStatus;
use crate::types::{PumpCommand, PumpMode};

/// An event emitted by the engine when link or pump state changes.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A verified status response updated the pump status snapshot.
    StatusUpdated {
        /// The new snapshot.
        status: PumpStatus,
    },

    /// An outstanding command was acknowledged by the pump.
    CommandCompleted {
        /// The command that completed.
        command: PumpCommand,
    },

    /// A command exhausted its retry budget without a response.
    ///
    /// The status snapshot is marked stale but retains its last values.
    CommandFailed {
        /// The command that failed.
        command: PumpCommand,
        /// Total transmission attempts made (initial send plus retries).
        attempts: u32,
    },

    /// The reassembly buffer overran and the oldest bytes were dropped.
    ///
    /// The link remains usable; subsequent frames resynchronize normally.
    BufferOverrun {
        /// Number of bytes discarded.
        dropped: usize,
    },

    /// The periodic re-assertion of an external program was armed.
    ExternalProgramArmed {
        /// The program mode being held.
        mode: PumpMode,
    },

    /// The external-program repeat obligation was cancelled, either
    /// explicitly or by a command selecting a different mode.
    ExternalProgramCancelled,

    /// A transport-level failure was observed by the engine loop.
    TransportError {
        /// Human-readable description for logging/telemetry layers.
        message: String,
    },
}
