//! Simulated pump responder.
//!
//! [`SimulatedPump`] models one pump on the bus: it answers status queries
//! with correctly checksummed 15-byte reports and acknowledges control
//! commands by echoing them, the way a real drive does. Speed changes slew
//! gradually toward the target so tests can observe a ramp rather than an
//! instant jump.
//!
//! The simulator is pure frame-in/frame-out; wire it to a transport (or
//! call it directly) however the test wants.

use std::time::{Duration, Instant};

use pumpbus_pentair::commands;
use pumpbus_pentair::frame::Frame;

/// RPM change applied per slew step.
const SLEW_STEP_RPM: u16 = 50;

/// Interval between slew steps.
const SLEW_INTERVAL: Duration = Duration::from_millis(100);

/// A simulated Pentair pump.
#[derive(Debug)]
pub struct SimulatedPump {
    /// This pump's bus address.
    address: u8,
    running: bool,
    /// Raw mode byte, as set by the last mode command.
    mode: u8,
    /// Whether the pump accepts bus commands.
    remote_control: bool,
    current_rpm: u16,
    target_rpm: u16,
    error_code: u8,
    last_slew: Option<Instant>,
}

impl SimulatedPump {
    /// Create a stopped pump at the given bus address.
    pub fn new(address: u8) -> Self {
        SimulatedPump {
            address,
            running: false,
            mode: 0,
            remote_control: false,
            current_rpm: 0,
            target_rpm: 0,
            error_code: 0,
            last_slew: None,
        }
    }

    /// Force the running state (test setup shortcut).
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Force the current and target RPM (test setup shortcut).
    pub fn set_rpm(&mut self, rpm: u16) {
        self.current_rpm = rpm;
        self.target_rpm = rpm;
    }

    /// Report an error code in subsequent status responses.
    pub fn set_error_code(&mut self, code: u8) {
        self.error_code = code;
    }

    /// Current motor speed.
    pub fn current_rpm(&self) -> u16 {
        self.current_rpm
    }

    /// Whether the motor is running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the pump is under bus control.
    pub fn is_remote(&self) -> bool {
        self.remote_control
    }

    /// Process one decoded frame and produce the pump's response, if any.
    ///
    /// Frames addressed to other devices return `None`, like a real pump
    /// staying quiet on a shared bus.
    pub fn handle_frame(&mut self, frame: &Frame) -> Option<Frame> {
        if frame.destination != self.address {
            return None;
        }

        match frame.command {
            commands::CMD_SET_CONTROL => {
                self.remote_control = frame.data.first() == Some(&commands::CTRL_REMOTE);
                self.echo(frame)
            }
            commands::CMD_SET_RUN => {
                if self.remote_control {
                    match frame.data.first() {
                        Some(&commands::RUN_START) => {
                            self.running = true;
                            if self.target_rpm == 0 {
                                self.target_rpm = 1500;
                            }
                        }
                        Some(&commands::RUN_STOP) => {
                            self.running = false;
                            self.target_rpm = 0;
                        }
                        _ => {}
                    }
                }
                self.echo(frame)
            }
            commands::CMD_SET_MODE => {
                if self.remote_control {
                    if let Some(&mode) = frame.data.first() {
                        self.mode = mode;
                    }
                }
                self.echo(frame)
            }
            commands::CMD_WRITE_REGISTER => {
                if self.remote_control && frame.data.len() == 4 {
                    let register = u16::from_be_bytes([frame.data[0], frame.data[1]]);
                    let value = u16::from_be_bytes([frame.data[2], frame.data[3]]);
                    if register == commands::REG_SET_RPM {
                        self.target_rpm = value;
                        self.running = value > 0;
                    }
                }
                self.echo(frame)
            }
            commands::CMD_QUERY_STATUS => self.status_response(frame.source),
            _ => None,
        }
    }

    /// Advance the speed slew toward the target.
    pub fn step(&mut self, now: Instant) {
        let due = match self.last_slew {
            None => true,
            Some(previous) => now.duration_since(previous) >= SLEW_INTERVAL,
        };
        if !due {
            return;
        }
        self.last_slew = Some(now);

        let target = if self.running { self.target_rpm } else { 0 };
        if self.current_rpm < target {
            self.current_rpm = (self.current_rpm + SLEW_STEP_RPM).min(target);
        } else if self.current_rpm > target {
            self.current_rpm = self.current_rpm.saturating_sub(SLEW_STEP_RPM).max(target);
        }
    }

    /// A pump acknowledges a control command by echoing it back.
    fn echo(&self, frame: &Frame) -> Option<Frame> {
        Some(Frame {
            version: frame.version,
            destination: frame.source,
            source: self.address,
            command: frame.command,
            data: frame.data.clone(),
        })
    }

    fn status_response(&self, requester: u8) -> Option<Frame> {
        // Rough power curve: full speed draws about 1.5 kW.
        let watts = (self.current_rpm as u32 * 1500 / 3450) as u16;
        let data = vec![
            if self.running {
                commands::RUN_START
            } else {
                commands::RUN_STOP
            },
            self.mode,
            0x02, // drive ready
            (watts >> 8) as u8,
            (watts & 0xFF) as u8,
            (self.current_rpm >> 8) as u8,
            (self.current_rpm & 0xFF) as u8,
            0, // gpm (VS models report none)
            0, // ppc
            0,
            self.error_code,
            0,
            0, // timer
            12,
            0, // clock 12:00
        ];
        Some(Frame {
            version: 0,
            destination: requester,
            source: self.address,
            command: commands::CMD_QUERY_STATUS,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumpbus_core::{ControlMode, PumpCommand, RunAction};
    use pumpbus_pentair::commands::build_frame;

    const PUMP: u8 = 0x60;
    const CONTROLLER: u8 = 0x20;

    fn command_frame(command: PumpCommand) -> Frame {
        build_frame(command, PUMP, CONTROLLER)
    }

    #[test]
    fn ignores_frames_for_other_addresses() {
        let mut pump = SimulatedPump::new(PUMP);
        let frame = build_frame(PumpCommand::QueryStatus, 0x61, CONTROLLER);
        assert!(pump.handle_frame(&frame).is_none());
    }

    #[test]
    fn echoes_control_command_and_latches_remote() {
        let mut pump = SimulatedPump::new(PUMP);
        let frame = command_frame(PumpCommand::SetControl(ControlMode::Remote));
        let reply = pump.handle_frame(&frame).unwrap();

        assert!(pump.is_remote());
        assert_eq!(reply.destination, CONTROLLER);
        assert_eq!(reply.source, PUMP);
        assert_eq!(reply.command, frame.command);
        assert_eq!(reply.data, frame.data);
    }

    #[test]
    fn run_command_requires_remote_control() {
        let mut pump = SimulatedPump::new(PUMP);

        // Still in local control: the echo comes back but nothing changes.
        pump.handle_frame(&command_frame(PumpCommand::SetRun(RunAction::Start)));
        assert!(!pump.is_running());

        pump.handle_frame(&command_frame(PumpCommand::SetControl(ControlMode::Remote)));
        pump.handle_frame(&command_frame(PumpCommand::SetRun(RunAction::Start)));
        assert!(pump.is_running());
    }

    #[test]
    fn status_response_is_well_formed() {
        let mut pump = SimulatedPump::new(PUMP);
        pump.set_running(true);
        pump.set_rpm(2250);

        let reply = pump
            .handle_frame(&command_frame(PumpCommand::QueryStatus))
            .unwrap();
        assert_eq!(reply.data.len(), 15);

        // The response survives a full encode/decode round trip.
        let bytes = reply.encode().unwrap();
        let (decoded, _) = pumpbus_pentair::frame::decode_frame(&bytes).unwrap();
        let status = commands::parse_status(&decoded.data).unwrap();
        assert!(status.running);
        assert_eq!(status.rpm, 2250);
        assert!(status.drive_ready());
    }

    #[test]
    fn register_write_sets_target_speed() {
        let mut pump = SimulatedPump::new(PUMP);
        pump.handle_frame(&command_frame(PumpCommand::SetControl(ControlMode::Remote)));
        pump.handle_frame(&command_frame(PumpCommand::WriteRegister {
            register: commands::REG_SET_RPM,
            value: 2000,
        }));
        assert!(pump.is_running());
        assert_eq!(pump.current_rpm(), 0);

        // Speed ramps rather than jumping.
        let t0 = Instant::now();
        pump.step(t0);
        assert_eq!(pump.current_rpm(), 50);
        pump.step(t0 + SLEW_INTERVAL);
        assert_eq!(pump.current_rpm(), 100);
    }

    #[test]
    fn stop_slews_back_down() {
        let mut pump = SimulatedPump::new(PUMP);
        pump.handle_frame(&command_frame(PumpCommand::SetControl(ControlMode::Remote)));
        pump.set_running(true);
        pump.set_rpm(100);

        pump.handle_frame(&command_frame(PumpCommand::SetRun(RunAction::Stop)));
        let t0 = Instant::now();
        pump.step(t0);
        assert_eq!(pump.current_rpm(), 50);
        pump.step(t0 + SLEW_INTERVAL);
        assert_eq!(pump.current_rpm(), 0);
    }

    #[test]
    fn unknown_command_gets_no_reply() {
        let mut pump = SimulatedPump::new(PUMP);
        let frame = Frame::new(PUMP, CONTROLLER, 0x7F, vec![]).unwrap();
        assert!(pump.handle_frame(&frame).is_none());
    }
}
