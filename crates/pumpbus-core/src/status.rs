//! Last-known pump status snapshot.

use std::time::Instant;

/// The last-known status of a pump, built from verified status responses.
///
/// Owned exclusively by the command scheduler; collaborators receive
/// read-only clones via the engine handle. Mutated only on receipt of a
/// checksum-verified 15-byte status response from the configured pump
/// address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpStatus {
    /// Whether at least one status response has been received.
    pub valid: bool,
    /// Set when a status refresh has failed past its retry budget.
    ///
    /// The data fields retain their last good values — stale means old,
    /// not wrong.
    pub stale: bool,
    /// Whether the pump motor is running.
    pub running: bool,
    /// Raw operating-mode byte as reported by the pump.
    pub mode: u8,
    /// Raw drive-state byte (`0x02` = drive ready).
    pub drive: u8,
    /// Power consumption in watts.
    pub watts: u16,
    /// Motor speed in RPM.
    pub rpm: u16,
    /// Flow rate in gallons per minute (VF models; zero on VS models).
    pub gpm: u8,
    /// PPC / chlorinator level byte.
    pub ppc: u8,
    /// Error code reported by the drive (`0x00` = no error).
    pub error_code: u8,
    /// Timer remaining, in minutes.
    pub timer_minutes: u8,
    /// Pump clock, hour component.
    pub clock_hour: u8,
    /// Pump clock, minute component.
    pub clock_minute: u8,
    /// When the last status response was received. `None` until `valid`.
    pub last_updated: Option<Instant>,
}

impl Default for PumpStatus {
    fn default() -> Self {
        PumpStatus {
            valid: false,
            stale: false,
            running: false,
            mode: 0,
            drive: 0,
            watts: 0,
            rpm: 0,
            gpm: 0,
            ppc: 0,
            error_code: 0,
            timer_minutes: 0,
            clock_hour: 0,
            clock_minute: 0,
            last_updated: None,
        }
    }
}

impl PumpStatus {
    /// Drive-state byte value meaning the drive is ready.
    pub const DRIVE_READY: u8 = 0x02;

    /// Returns `true` if the drive reports ready.
    pub fn drive_ready(&self) -> bool {
        self.drive == Self::DRIVE_READY
    }

    /// Returns `true` if the pump reports an error condition.
    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }
}
