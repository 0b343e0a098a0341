//! Pump command builders and response parsers.
//!
//! This module provides functions to construct wire frames for the pump
//! operations (register writes, remote/local control, mode selection,
//! run/stop, status query) and to parse the 15-byte status response.
//!
//! All functions are pure — they produce or consume byte vectors without
//! performing any I/O. The scheduler owns the request/response session;
//! this module only knows the shapes.

use pumpbus_core::{ControlMode, Error, PumpCommand, PumpStatus, Result, RunAction};

use crate::frame::{self, Frame};

// ---------------------------------------------------------------
// Command/function identifiers (CFI)
// ---------------------------------------------------------------

/// Register write (cmd 0x01). Data: `[reg_hi, reg_lo, val_hi, val_lo]`.
pub const CMD_WRITE_REGISTER: u8 = 0x01;

/// Remote/local control (cmd 0x04). Data: `[0xFF]` remote, `[0x00]` local.
///
/// A pump ignores mode, run, and register commands until it has been placed
/// under remote control.
pub const CMD_SET_CONTROL: u8 = 0x04;

/// Mode select (cmd 0x05). Data: one mode byte.
pub const CMD_SET_MODE: u8 = 0x05;

/// Run/stop (cmd 0x06). Data: `[0x0A]` start, `[0x04]` stop.
pub const CMD_SET_RUN: u8 = 0x06;

/// Status query (cmd 0x07). No data; the pump answers with 15 status bytes.
pub const CMD_QUERY_STATUS: u8 = 0x07;

/// Control byte: accept commands from the bus.
pub const CTRL_REMOTE: u8 = 0xFF;
/// Control byte: return to front-panel control.
pub const CTRL_LOCAL: u8 = 0x00;

/// Run byte: start the motor.
pub const RUN_START: u8 = 0x0A;
/// Run byte: stop the motor.
pub const RUN_STOP: u8 = 0x04;

// ---------------------------------------------------------------
// Register addresses (for CMD_WRITE_REGISTER)
// ---------------------------------------------------------------

/// Set speed directly in RPM (variable-speed models).
pub const REG_SET_RPM: u16 = 0x02C4;

/// Set flow directly in GPM (variable-flow models).
pub const REG_SET_GPM: u16 = 0x02E4;

/// Select which external program runs (values [`EPRG_OFF`]..[`EPRG_4`]).
pub const REG_EXT_PROG: u16 = 0x0321;

/// All external programs off.
pub const EPRG_OFF: u16 = 0x0000;
/// Select external program 1.
pub const EPRG_1: u16 = 0x0008;
/// Select external program 2.
pub const EPRG_2: u16 = 0x0010;
/// Select external program 3.
pub const EPRG_3: u16 = 0x0018;
/// Select external program 4.
pub const EPRG_4: u16 = 0x0020;

/// Set the RPM for external program 1 (programs 2–4 follow consecutively).
pub const REG_EXT_PROG_1_RPM: u16 = 0x0327;

/// Lowest RPM a variable-speed drive accepts.
pub const RPM_MIN: u16 = 450;
/// Highest RPM a variable-speed drive accepts.
pub const RPM_MAX: u16 = 3450;

/// Length of the status-response payload.
pub const STATUS_DATA_LEN: usize = 15;

// Status response payload indices.
const STAT_RUN: usize = 0;
const STAT_MODE: usize = 1;
const STAT_DRIVE: usize = 2;
const STAT_PWR_HI: usize = 3;
const STAT_PWR_LO: usize = 4;
const STAT_RPM_HI: usize = 5;
const STAT_RPM_LO: usize = 6;
const STAT_GPM: usize = 7;
const STAT_PPC: usize = 8;
const STAT_ERR: usize = 10;
const STAT_TIMER: usize = 12;
const STAT_CLK_HOUR: usize = 13;
const STAT_CLK_MIN: usize = 14;

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// The CFI byte a given command is transmitted with.
///
/// Responses echo the CFI, so this is also what the scheduler matches
/// against when resolving an outstanding command.
pub fn command_id(command: PumpCommand) -> u8 {
    match command {
        PumpCommand::WriteRegister { .. } => CMD_WRITE_REGISTER,
        PumpCommand::SetControl(_) => CMD_SET_CONTROL,
        PumpCommand::SetMode(_) => CMD_SET_MODE,
        PumpCommand::SetRun(_) => CMD_SET_RUN,
        PumpCommand::QueryStatus => CMD_QUERY_STATUS,
    }
}

/// Build the wire frame for a command, addressed `controller` → `pump`.
pub fn build_frame(command: PumpCommand, pump: u8, controller: u8) -> Frame {
    let (cmd, data) = match command {
        PumpCommand::WriteRegister { register, value } => {
            let [reg_hi, reg_lo] = register.to_be_bytes();
            let [val_hi, val_lo] = value.to_be_bytes();
            (CMD_WRITE_REGISTER, vec![reg_hi, reg_lo, val_hi, val_lo])
        }
        PumpCommand::SetControl(ControlMode::Remote) => (CMD_SET_CONTROL, vec![CTRL_REMOTE]),
        PumpCommand::SetControl(ControlMode::Local) => (CMD_SET_CONTROL, vec![CTRL_LOCAL]),
        PumpCommand::SetMode(mode) => (CMD_SET_MODE, vec![mode.as_byte()]),
        PumpCommand::SetRun(RunAction::Start) => (CMD_SET_RUN, vec![RUN_START]),
        PumpCommand::SetRun(RunAction::Stop) => (CMD_SET_RUN, vec![RUN_STOP]),
        PumpCommand::QueryStatus => (CMD_QUERY_STATUS, vec![]),
    };
    Frame {
        version: frame::PROTOCOL_VERSION,
        destination: pump,
        source: controller,
        command: cmd,
        data,
    }
}

/// Encode a command straight to wire bytes, addressed `controller` → `pump`.
pub fn encode_command(command: PumpCommand, pump: u8, controller: u8) -> Result<Vec<u8>> {
    build_frame(command, pump, controller).encode()
}

/// Build a set-RPM command, validating the drive's speed range.
pub fn set_rpm(rpm: u16) -> Result<PumpCommand> {
    if !(RPM_MIN..=RPM_MAX).contains(&rpm) {
        return Err(Error::InvalidParameter(format!(
            "rpm {rpm} outside {RPM_MIN}-{RPM_MAX}"
        )));
    }
    Ok(PumpCommand::WriteRegister {
        register: REG_SET_RPM,
        value: rpm,
    })
}

/// Build a register write selecting external program 1–4, or 0 for off.
pub fn select_external_program(program: u8) -> Result<PumpCommand> {
    let value = match program {
        0 => EPRG_OFF,
        1 => EPRG_1,
        2 => EPRG_2,
        3 => EPRG_3,
        4 => EPRG_4,
        _ => {
            return Err(Error::InvalidParameter(format!(
                "external program {program} outside 0-4"
            )))
        }
    };
    Ok(PumpCommand::WriteRegister {
        register: REG_EXT_PROG,
        value,
    })
}

/// Build a register write setting the stored RPM of external program 1–4.
pub fn set_external_program_rpm(program: u8, rpm: u16) -> Result<PumpCommand> {
    if !(1..=4).contains(&program) {
        return Err(Error::InvalidParameter(format!(
            "external program {program} outside 1-4"
        )));
    }
    if !(RPM_MIN..=RPM_MAX).contains(&rpm) {
        return Err(Error::InvalidParameter(format!(
            "rpm {rpm} outside {RPM_MIN}-{RPM_MAX}"
        )));
    }
    Ok(PumpCommand::WriteRegister {
        register: REG_EXT_PROG_1_RPM + (program - 1) as u16,
        value: rpm,
    })
}

// ---------------------------------------------------------------
// Response parsers
// ---------------------------------------------------------------

/// Returns `true` if `frame` carries a full 15-byte status payload.
pub fn is_status_response(frame: &Frame) -> bool {
    frame.command == CMD_QUERY_STATUS && frame.data.len() == STATUS_DATA_LEN
}

/// Parse a 15-byte status payload into a [`PumpStatus`].
///
/// The returned snapshot has `valid` set and no timestamp — stamping is
/// the scheduler's job, since only it knows the injected clock.
pub fn parse_status(data: &[u8]) -> Result<PumpStatus> {
    if data.len() != STATUS_DATA_LEN {
        return Err(Error::Protocol(format!(
            "status payload is {} bytes, expected {STATUS_DATA_LEN}",
            data.len()
        )));
    }

    Ok(PumpStatus {
        valid: true,
        stale: false,
        running: data[STAT_RUN] == RUN_START,
        mode: data[STAT_MODE],
        drive: data[STAT_DRIVE],
        watts: u16::from_be_bytes([data[STAT_PWR_HI], data[STAT_PWR_LO]]),
        rpm: u16::from_be_bytes([data[STAT_RPM_HI], data[STAT_RPM_LO]]),
        gpm: data[STAT_GPM],
        ppc: data[STAT_PPC],
        error_code: data[STAT_ERR],
        timer_minutes: data[STAT_TIMER],
        clock_hour: data[STAT_CLK_HOUR],
        clock_minute: data[STAT_CLK_MIN],
        last_updated: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumpbus_core::PumpMode;

    const PUMP: u8 = 0x60;
    const CONTROLLER: u8 = 0x20;

    // ---------------------------------------------------------------
    // Builders
    // ---------------------------------------------------------------

    #[test]
    fn status_query_wire_bytes() {
        let bytes = encode_command(PumpCommand::QueryStatus, PUMP, CONTROLLER).unwrap();
        assert_eq!(
            bytes,
            vec![0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x07, 0x00, 0x01, 0x2C]
        );
    }

    #[test]
    fn remote_control_payload() {
        let frame = build_frame(
            PumpCommand::SetControl(ControlMode::Remote),
            PUMP,
            CONTROLLER,
        );
        assert_eq!(frame.command, CMD_SET_CONTROL);
        assert_eq!(frame.data, vec![0xFF]);

        let frame = build_frame(
            PumpCommand::SetControl(ControlMode::Local),
            PUMP,
            CONTROLLER,
        );
        assert_eq!(frame.data, vec![0x00]);
    }

    #[test]
    fn run_stop_payloads() {
        let start = build_frame(PumpCommand::SetRun(RunAction::Start), PUMP, CONTROLLER);
        assert_eq!(start.command, CMD_SET_RUN);
        assert_eq!(start.data, vec![0x0A]);

        let stop = build_frame(PumpCommand::SetRun(RunAction::Stop), PUMP, CONTROLLER);
        assert_eq!(stop.data, vec![0x04]);
    }

    #[test]
    fn set_mode_payload() {
        let frame = build_frame(
            PumpCommand::SetMode(PumpMode::ExternalProgram2),
            PUMP,
            CONTROLLER,
        );
        assert_eq!(frame.command, CMD_SET_MODE);
        assert_eq!(frame.data, vec![0x0A]);
    }

    #[test]
    fn write_register_big_endian() {
        let frame = build_frame(
            PumpCommand::WriteRegister {
                register: REG_SET_RPM,
                value: 1500,
            },
            PUMP,
            CONTROLLER,
        );
        assert_eq!(frame.command, CMD_WRITE_REGISTER);
        assert_eq!(frame.data, vec![0x02, 0xC4, 0x05, 0xDC]);
    }

    #[test]
    fn frames_are_addressed_controller_to_pump() {
        let frame = build_frame(PumpCommand::QueryStatus, PUMP, CONTROLLER);
        assert_eq!(frame.destination, PUMP);
        assert_eq!(frame.source, CONTROLLER);
    }

    #[test]
    fn set_rpm_validates_range() {
        assert!(set_rpm(449).is_err());
        assert!(set_rpm(3451).is_err());
        assert_eq!(
            set_rpm(450).unwrap(),
            PumpCommand::WriteRegister {
                register: REG_SET_RPM,
                value: 450
            }
        );
        assert!(set_rpm(3450).is_ok());
    }

    #[test]
    fn select_external_program_values() {
        assert_eq!(
            select_external_program(0).unwrap(),
            PumpCommand::WriteRegister {
                register: REG_EXT_PROG,
                value: EPRG_OFF
            }
        );
        assert_eq!(
            select_external_program(3).unwrap(),
            PumpCommand::WriteRegister {
                register: REG_EXT_PROG,
                value: EPRG_3
            }
        );
        assert!(select_external_program(5).is_err());
    }

    #[test]
    fn external_program_rpm_registers_are_consecutive() {
        let cmd = set_external_program_rpm(4, 2400).unwrap();
        assert_eq!(
            cmd,
            PumpCommand::WriteRegister {
                register: 0x032A,
                value: 2400
            }
        );
        assert!(set_external_program_rpm(0, 2400).is_err());
        assert!(set_external_program_rpm(1, 100).is_err());
    }

    #[test]
    fn command_ids_match_wire_values() {
        assert_eq!(command_id(PumpCommand::QueryStatus), 0x07);
        assert_eq!(command_id(PumpCommand::SetRun(RunAction::Stop)), 0x06);
        assert_eq!(command_id(PumpCommand::SetMode(PumpMode::Filter)), 0x05);
        assert_eq!(command_id(PumpCommand::SetControl(ControlMode::Remote)), 0x04);
        assert_eq!(
            command_id(PumpCommand::WriteRegister { register: 0, value: 0 }),
            0x01
        );
    }

    // ---------------------------------------------------------------
    // Status parsing
    // ---------------------------------------------------------------

    fn sample_status_data() -> Vec<u8> {
        vec![
            0x0A, // running
            0x09, // mode: external program 1
            0x02, // drive ready
            0x02, 0x58, // 600 watts
            0x08, 0xCA, // 2250 rpm
            0x26, // 38 gpm
            0x00, // ppc
            0x00, // reserved
            0x00, // no error
            0x00, // reserved
            0x3C, // 60 minutes remaining
            0x0D, 0x25, // 13:37
        ]
    }

    #[test]
    fn parse_status_full_payload() {
        let status = parse_status(&sample_status_data()).unwrap();
        assert!(status.valid);
        assert!(!status.stale);
        assert!(status.running);
        assert_eq!(status.mode, 0x09);
        assert!(status.drive_ready());
        assert_eq!(status.watts, 600);
        assert_eq!(status.rpm, 2250);
        assert_eq!(status.gpm, 0x26);
        assert_eq!(status.error_code, 0);
        assert_eq!(status.timer_minutes, 60);
        assert_eq!(status.clock_hour, 13);
        assert_eq!(status.clock_minute, 37);
        assert!(status.last_updated.is_none());
    }

    #[test]
    fn parse_status_stopped_pump() {
        let mut data = sample_status_data();
        data[0] = RUN_STOP;
        let status = parse_status(&data).unwrap();
        assert!(!status.running);
    }

    #[test]
    fn parse_status_wrong_length() {
        assert!(parse_status(&[0x0A; 14]).is_err());
        assert!(parse_status(&[0x0A; 16]).is_err());
        assert!(parse_status(&[]).is_err());
    }

    #[test]
    fn status_response_classification() {
        let response = Frame::new(CONTROLLER, PUMP, CMD_QUERY_STATUS, sample_status_data()).unwrap();
        assert!(is_status_response(&response));

        // An echoed status query (no payload) is not a status response.
        let echo = Frame::new(CONTROLLER, PUMP, CMD_QUERY_STATUS, vec![]).unwrap();
        assert!(!is_status_response(&echo));

        let run_ack = Frame::new(CONTROLLER, PUMP, CMD_SET_RUN, vec![RUN_START]).unwrap();
        assert!(!is_status_response(&run_ack));
    }
}
