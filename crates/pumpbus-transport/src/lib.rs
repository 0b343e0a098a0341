//! pumpbus-transport: Serial transport implementation for pumpbus.
//!
//! Provides [`SerialTransport`], a half-duplex RS-485 implementation of the
//! [`Transport`](pumpbus_core::Transport) trait with explicit driver-enable
//! turnaround control.

pub mod serial;

pub use serial::{
    DataBits, DriverEnable, FlowControl, Parity, SerialConfig, SerialTransport, StopBits,
};
