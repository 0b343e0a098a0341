//! Transport trait for bus communication.
//!
//! The [`Transport`] trait abstracts over the physical link to the RS-485
//! bus. Implementations exist for serial transceivers (half-duplex DE/RE
//! control) and for mock transports used in testing.
//!
//! The protocol engine in `pumpbus-pentair` operates on a `Transport` rather
//! than directly on a serial port, enabling both real hardware control and
//! deterministic unit testing with `MockTransport` from the
//! `pumpbus-test-harness` crate.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to the RS-485 bus.
///
/// Implementations handle line discipline at the physical layer —
/// driver-enable turnaround, buffering, guard delays. Protocol-level
/// concerns (framing, addressing, checksums) are handled by the engine
/// that consumes this trait.
///
/// A transport is a single mutually exclusive resource: only one send or
/// receive may be in flight at a time. Callers must serialize access;
/// concurrent use is a contract violation, not a runtime-detected error.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes onto the bus.
    ///
    /// Implementations must not return until every byte has physically left
    /// the transmitter and the line has been returned to listen mode —
    /// other devices share the wire, and a premature return would let the
    /// caller collide with its own tail.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the bus into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if no data is received within the deadline. A partial read (fewer
    /// bytes than the buffer holds) is a normal outcome — frame boundaries
    /// are recovered downstream by the stream reassembler.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
