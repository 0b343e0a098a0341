//! Shared command vocabulary for pump control.
//!
//! These are the types collaborators (MQTT bridges, consoles, dashboards)
//! use when submitting work through the engine handle. The byte-level
//! rendering of each command lives in the protocol driver crate.

use std::fmt;

/// Pump operating mode, as carried in the set-mode command and echoed in
/// status responses.
///
/// The external-program modes are special: a pump running an external
/// program must have the selecting command re-asserted on a fixed cadence
/// or it silently reverts to local control. The scheduler handles that
/// obligation automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpMode {
    /// Filter mode (the pump's own schedule).
    Filter,
    /// Manual mode.
    Manual,
    /// Speed preset 1.
    Speed1,
    /// Speed preset 2.
    Speed2,
    /// Speed preset 3.
    Speed3,
    /// Speed preset 4.
    Speed4,
    /// Feature 1 (auxiliary relay-driven mode).
    Feature1,
    /// External program 1.
    ExternalProgram1,
    /// External program 2.
    ExternalProgram2,
    /// External program 3.
    ExternalProgram3,
    /// External program 4.
    ExternalProgram4,
}

impl PumpMode {
    /// The wire byte for this mode.
    pub fn as_byte(self) -> u8 {
        match self {
            PumpMode::Filter => 0x00,
            PumpMode::Manual => 0x01,
            PumpMode::Speed1 => 0x02,
            PumpMode::Speed2 => 0x03,
            PumpMode::Speed3 => 0x04,
            PumpMode::Speed4 => 0x05,
            PumpMode::Feature1 => 0x06,
            PumpMode::ExternalProgram1 => 0x09,
            PumpMode::ExternalProgram2 => 0x0A,
            PumpMode::ExternalProgram3 => 0x0B,
            PumpMode::ExternalProgram4 => 0x0C,
        }
    }

    /// Parse a wire byte into a mode. Returns `None` for unknown values.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(PumpMode::Filter),
            0x01 => Some(PumpMode::Manual),
            0x02 => Some(PumpMode::Speed1),
            0x03 => Some(PumpMode::Speed2),
            0x04 => Some(PumpMode::Speed3),
            0x05 => Some(PumpMode::Speed4),
            0x06 => Some(PumpMode::Feature1),
            0x09 => Some(PumpMode::ExternalProgram1),
            0x0A => Some(PumpMode::ExternalProgram2),
            0x0B => Some(PumpMode::ExternalProgram3),
            0x0C => Some(PumpMode::ExternalProgram4),
            _ => None,
        }
    }

    /// Returns `true` for the four external-program modes.
    pub fn is_external_program(self) -> bool {
        matches!(
            self,
            PumpMode::ExternalProgram1
                | PumpMode::ExternalProgram2
                | PumpMode::ExternalProgram3
                | PumpMode::ExternalProgram4
        )
    }
}

impl fmt::Display for PumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PumpMode::Filter => "filter",
            PumpMode::Manual => "manual",
            PumpMode::Speed1 => "speed-1",
            PumpMode::Speed2 => "speed-2",
            PumpMode::Speed3 => "speed-3",
            PumpMode::Speed4 => "speed-4",
            PumpMode::Feature1 => "feature-1",
            PumpMode::ExternalProgram1 => "ext-prog-1",
            PumpMode::ExternalProgram2 => "ext-prog-2",
            PumpMode::ExternalProgram3 => "ext-prog-3",
            PumpMode::ExternalProgram4 => "ext-prog-4",
        };
        f.write_str(name)
    }
}

/// Whether the pump accepts commands from the bus or its front panel.
///
/// A pump must be placed under remote control before it will act on mode,
/// run, or register-write commands from a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// Accept commands from the bus.
    Remote,
    /// Return control to the pump's front panel.
    Local,
}

/// Start or stop the pump motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Start,
    Stop,
}

/// A command a collaborator can submit to the scheduler.
///
/// Each variant maps to exactly one wire command; the protocol driver
/// renders the frame and the scheduler tracks the request/response session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    /// Write a 16-bit value to a pump memory register (set RPM, select
    /// external programs, program speeds).
    WriteRegister { register: u16, value: u16 },
    /// Switch the pump between remote (bus) and local (panel) control.
    SetControl(ControlMode),
    /// Select an operating mode.
    SetMode(PumpMode),
    /// Start or stop the motor.
    SetRun(RunAction),
    /// Request a 15-byte status report. The only command that queues
    /// behind outstanding work instead of being rejected `Busy`.
    QueryStatus,
}

impl PumpCommand {
    /// Returns `true` for the low-priority status poll.
    pub fn is_poll(self) -> bool {
        matches!(self, PumpCommand::QueryStatus)
    }

    /// The mode selected by this command, if it is a set-mode command.
    pub fn selected_mode(self) -> Option<PumpMode> {
        match self {
            PumpCommand::SetMode(mode) => Some(mode),
            _ => None,
        }
    }

    /// Returns `true` when both commands are the same kind, ignoring
    /// parameters. Used for queue supersession — a newer command replaces
    /// an older queued one of the same kind.
    pub fn same_kind(self, other: PumpCommand) -> bool {
        std::mem::discriminant(&self) == std::mem::discriminant(&other)
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpCommand::WriteRegister { register, value } => {
                write!(f, "write-register {register:#06X} = {value:#06X}")
            }
            PumpCommand::SetControl(ControlMode::Remote) => f.write_str("set-control remote"),
            PumpCommand::SetControl(ControlMode::Local) => f.write_str("set-control local"),
            PumpCommand::SetMode(mode) => write!(f, "set-mode {mode}"),
            PumpCommand::SetRun(RunAction::Start) => f.write_str("run start"),
            PumpCommand::SetRun(RunAction::Stop) => f.write_str("run stop"),
            PumpCommand::QueryStatus => f.write_str("query-status"),
        }
    }
}
