//! Pump status monitor example.
//!
//! Connects to a pump, takes it under remote control, and prints every
//! status update the engine's idle poll brings back.
//!
//! # Requirements
//!
//! - A Pentair IntelliFlo pump on an RS-485 bus reachable through a serial
//!   adapter
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//!
//! # Usage
//!
//! ```sh
//! cargo run -p pumpbus --example status_monitor
//! ```

use pumpbus::{ControlMode, EngineEvent, PumpBuilder, PumpCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to pump 1 on {}...", serial_port);

    let pump = PumpBuilder::new().serial_port(serial_port).build().await?;
    let mut events = pump.subscribe();

    // The pump ignores everything until it is under remote control.
    pump.submit(PumpCommand::SetControl(ControlMode::Remote))
        .await?;

    println!("Watching for status updates (ctrl-c to exit)...");

    loop {
        match events.recv().await {
            Ok(EngineEvent::StatusUpdated { status }) => {
                println!(
                    "{} | {:4} RPM | {:4} W | mode {:#04X} | error {:#04X}{}",
                    if status.running { "RUN " } else { "STOP" },
                    status.rpm,
                    status.watts,
                    status.mode,
                    status.error_code,
                    if status.stale { " (stale)" } else { "" },
                );
            }
            Ok(EngineEvent::CommandFailed { command, attempts }) => {
                eprintln!("command {command} failed after {attempts} attempts");
            }
            Ok(EngineEvent::TransportError { message }) => {
                eprintln!("transport error: {message}");
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    Ok(())
}
