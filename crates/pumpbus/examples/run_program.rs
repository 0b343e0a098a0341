//! External program example.
//!
//! Takes the pump under remote control, programs a speed for external
//! program 1, and starts it. The engine re-asserts the program selection
//! every 30 seconds for as long as the process runs; stopping the program
//! cleanly hands the pump back to local control.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p pumpbus --example run_program
//! ```

use std::time::Duration;

use pumpbus::pentair::commands;
use pumpbus::{ControlMode, EngineEvent, PumpBuilder, PumpCommand, PumpMode};

/// Wait for the completion (or failure) of the command just submitted.
async fn await_completion(
    events: &mut tokio::sync::broadcast::Receiver<EngineEvent>,
) -> anyhow::Result<()> {
    loop {
        match events.recv().await? {
            EngineEvent::CommandCompleted { command } => {
                println!("  ok: {command}");
                return Ok(());
            }
            EngineEvent::CommandFailed { command, attempts } => {
                anyhow::bail!("{command} failed after {attempts} attempts");
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let serial_port = "/dev/ttyUSB0";
    let rpm = 2200;

    let pump = PumpBuilder::new().serial_port(serial_port).build().await?;
    let mut events = pump.subscribe();

    println!("Taking remote control...");
    pump.submit(PumpCommand::SetControl(ControlMode::Remote))
        .await?;
    await_completion(&mut events).await?;

    println!("Programming external program 1 to {rpm} RPM...");
    pump.submit(commands::set_external_program_rpm(1, rpm)?)
        .await?;
    await_completion(&mut events).await?;

    println!("Entering external program 1 (re-asserted every 30 s)...");
    pump.submit(PumpCommand::SetMode(PumpMode::ExternalProgram1))
        .await?;
    await_completion(&mut events).await?;

    println!("Running for two minutes...");
    tokio::time::sleep(Duration::from_secs(120)).await;

    let status = pump.status().await?;
    println!(
        "Status: {} RPM, {} W{}",
        status.rpm,
        status.watts,
        if status.stale { " (stale)" } else { "" }
    );

    println!("Returning the pump to local control...");
    pump.submit(PumpCommand::SetControl(ControlMode::Local))
        .await?;
    await_completion(&mut events).await?;

    let _ = pump.shutdown().await;
    println!("Done.");
    Ok(())
}
