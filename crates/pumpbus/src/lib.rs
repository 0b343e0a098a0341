//! # pumpbus -- Pentair pump control over RS-485
//!
//! `pumpbus` is an asynchronous Rust library for driving Pentair IntelliFlo
//! variable-speed pumps on their shared RS-485 bus. It is designed for
//! bridges and automation daemons (MQTT, dashboards, consoles) that need
//! reliable pump control without owning the gritty parts: half-duplex line
//! turnaround, frame reassembly from a noisy shared wire, response
//! timeouts, and the external-program keep-alive the drives demand.
//!
//! ## Quick Start
//!
//! Add `pumpbus` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! pumpbus = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a pump and read its status:
//!
//! ```no_run
//! use pumpbus::{ControlMode, PumpBuilder, PumpCommand};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pump = PumpBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .build()
//!         .await?;
//!
//!     pump.submit(PumpCommand::SetControl(ControlMode::Remote)).await?;
//!
//!     let status = pump.status().await?;
//!     println!("{} RPM, {} W", status.rpm, status.watts);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                  | Purpose                                      |
//! |------------------------|----------------------------------------------|
//! | `pumpbus-core`         | Traits, command/status types, errors, events |
//! | `pumpbus-transport`    | Half-duplex RS-485 serial transport          |
//! | `pumpbus-pentair`      | Pentair wire protocol driver and scheduler   |
//! | `pumpbus-test-harness` | Mock transport and simulated pump            |
//! | **`pumpbus`**          | This facade crate -- re-exports everything   |
//!
//! ## The engine
//!
//! One spawned task owns the serial line. Collaborators hold a
//! [`PumpHandle`] and interact through three calls:
//!
//! - [`submit`](PumpHandle::submit) -- queue a command ([`PumpCommand`]);
//!   rejected [`Busy`](Error::Busy) while another is awaiting its response
//! - [`status`](PumpHandle::status) -- read-only [`PumpStatus`] snapshot
//! - [`subscribe`](PumpHandle::subscribe) -- [`EngineEvent`] notifications
//!   (status updates, completions, failures, overruns)
//!
//! The engine re-asserts an external-program selection every 30 seconds on
//! its own; without that keep-alive the drive silently reverts to local
//! control. Entering any external program arms it, changing mode away or
//! calling [`cancel_external_program`](PumpHandle::cancel_external_program)
//! disarms it.

pub use pumpbus_core::*;

/// Pentair wire protocol driver: codec, reassembler, scheduler, engine.
pub mod pentair {
    pub use pumpbus_pentair::*;
}

/// Serial transport implementation (half-duplex DE/RE control).
pub mod transport {
    pub use pumpbus_transport::*;
}

pub use pumpbus_pentair::{PumpBuilder, PumpHandle};
