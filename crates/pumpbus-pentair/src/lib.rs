//! pumpbus-pentair: Pentair RS-485 pump protocol driver.
//!
//! Implements the link-layer engine for driving Pentair IntelliFlo
//! variable-speed pumps on their shared half-duplex RS-485 bus:
//!
//! - [`frame`] -- pure wire codec (marker, header, checksum)
//! - [`reassembler`] -- frame boundary recovery from the raw byte stream
//! - [`commands`] -- command builders and the status-response parser
//! - [`scheduler`] -- the request/response session state machine, retry
//!   policy, idle status poll, and the external-program repeat obligation
//! - [`engine`] -- the spawned task owning the transport, plus the
//!   collaborator-facing [`PumpHandle`]
//! - [`builder`] -- fluent configuration ([`PumpBuilder`])
//!
//! # Example
//!
//! ```no_run
//! use pumpbus_pentair::PumpBuilder;
//! use pumpbus_core::{ControlMode, PumpCommand};
//!
//! # async fn example() -> pumpbus_core::Result<()> {
//! let pump = PumpBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .build()
//!     .await?;
//!
//! // Take the pump under bus control; completion arrives as an event.
//! pump.submit(PumpCommand::SetControl(ControlMode::Remote)).await?;
//!
//! let status = pump.status().await?;
//! println!("{} rpm, {} W", status.rpm, status.watts);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod builder;
pub mod commands;
pub mod engine;
pub mod frame;
pub mod reassembler;
pub mod scheduler;

pub use builder::PumpBuilder;
pub use engine::PumpHandle;
pub use frame::{DecodeError, Frame};
pub use reassembler::{FeedResult, Reassembler};
pub use scheduler::{Scheduler, SchedulerConfig};
