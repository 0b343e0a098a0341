//! PumpBuilder -- fluent builder for constructing a [`PumpHandle`].
//!
//! Separates configuration from construction so that callers can set up
//! serial parameters, bus addresses, retry policy, and timing before the
//! transport is opened and the engine task spawned.
//!
//! # Example
//!
//! ```no_run
//! use pumpbus_pentair::PumpBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> pumpbus_core::Result<()> {
//! let pump = PumpBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .pump_address(0x60)
//!     .response_timeout(Duration::from_secs(2))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use pumpbus_core::error::{Error, Result};
use pumpbus_core::transport::Transport;
use pumpbus_transport::SerialTransport;

use crate::address;
use crate::engine::{self, EngineConfig, PumpHandle};
use crate::reassembler;
use crate::scheduler::SchedulerConfig;

/// Fluent builder for a pump engine.
///
/// All configuration has defaults matching a single IntelliFlo pump at
/// factory addressing, so the simplest usage is:
///
/// ```ignore
/// let pump = PumpBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct PumpBuilder {
    serial_port: Option<String>,
    baud_rate: u32,
    pump_address: u8,
    controller_address: u8,
    response_timeout: Duration,
    max_retries: u32,
    poll_interval: Duration,
    repeat_interval: Duration,
    read_timeout: Duration,
    max_buffer: usize,
}

impl PumpBuilder {
    /// Create a builder with factory defaults: pump 1 (`0x60`) driven from
    /// remote-controller address `0x20` at 9600 baud.
    pub fn new() -> Self {
        PumpBuilder {
            serial_port: None,
            baud_rate: 9600,
            pump_address: address::DEFAULT_PUMP,
            controller_address: address::DEFAULT_CONTROLLER,
            response_timeout: crate::scheduler::RESPONSE_TIMEOUT,
            max_retries: crate::scheduler::DEFAULT_MAX_RETRIES,
            poll_interval: crate::scheduler::STATUS_POLL_INTERVAL,
            repeat_interval: crate::scheduler::EXTERNAL_PROGRAM_REPEAT_INTERVAL,
            read_timeout: Duration::from_millis(50),
            max_buffer: reassembler::DEFAULT_MAX_BUFFER,
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    /// Override the default 9600 baud rate.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Target a different pump (`0x60`–`0x6F`).
    pub fn pump_address(mut self, addr: u8) -> Self {
        self.pump_address = addr;
        self
    }

    /// Claim a different remote-controller address (`0x20`–`0x2F`).
    ///
    /// Use this when another remote controller already occupies `0x20`
    /// on the bus.
    pub fn controller_address(mut self, addr: u8) -> Self {
        self.controller_address = addr;
        self
    }

    /// Set the response deadline for one command exchange (default: 2 s).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the retransmissions allowed after the first timeout (default: 1).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Set the bus-idle interval that triggers a status poll (default: 15 s).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the external-program re-assertion cadence (default: 30 s).
    ///
    /// The pump abandons its external program if this is overrun; raise it
    /// only if you know your drive tolerates more.
    pub fn repeat_interval(mut self, interval: Duration) -> Self {
        self.repeat_interval = interval;
        self
    }

    /// Set the engine loop's bounded read timeout (default: 50 ms).
    ///
    /// This is also the worst-case tick cadence; keep it well under the
    /// response timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the reassembly buffer cap (default: 4096 bytes).
    pub fn max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = bytes;
        self
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        if !address::is_pump(self.pump_address) {
            return Err(Error::InvalidParameter(format!(
                "pump address {:#04X} outside pump range 0x60-0x6F",
                self.pump_address
            )));
        }
        if !address::is_remote_controller(self.controller_address) {
            return Err(Error::InvalidParameter(format!(
                "controller address {:#04X} outside remote-controller range 0x20-0x2F",
                self.controller_address
            )));
        }

        Ok(EngineConfig {
            scheduler: SchedulerConfig {
                pump_address: self.pump_address,
                controller_address: self.controller_address,
                response_timeout: self.response_timeout,
                max_retries: self.max_retries,
                poll_interval: self.poll_interval,
                repeat_interval: self.repeat_interval,
            },
            read_timeout: self.read_timeout,
            max_buffer: self.max_buffer,
        })
    }

    /// Build with a caller-provided transport.
    ///
    /// This is the primary entry point for testing (pass a `MockTransport`
    /// from `pumpbus-test-harness`) and for advanced use cases where the
    /// caller manages the transport lifecycle directly.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<PumpHandle> {
        let config = self.engine_config()?;
        Ok(engine::spawn_engine(transport, config))
    }

    /// Build using a serial transport.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    pub async fn build(self) -> Result<PumpHandle> {
        let port = self
            .serial_port
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("serial_port is required for build()".into()))?
            .clone();
        let config = self.engine_config()?;

        let transport = SerialTransport::open(&port, self.baud_rate).await?;
        Ok(engine::spawn_engine(Box::new(transport), config))
    }
}

impl Default for PumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pumpbus_test_harness::MockTransport;

    #[tokio::test]
    async fn builder_defaults_spawn_engine() {
        let mock = MockTransport::new();
        let handle = PumpBuilder::new()
            .build_with_transport(Box::new(mock))
            .unwrap();

        let status = handle.status().await.unwrap();
        assert!(!status.valid);

        let _ = handle.shutdown().await;
    }

    #[tokio::test]
    async fn builder_rejects_bad_pump_address() {
        let mock = MockTransport::new();
        let result = PumpBuilder::new()
            .pump_address(0x10)
            .build_with_transport(Box::new(mock));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_rejects_bad_controller_address() {
        let mock = MockTransport::new();
        let result = PumpBuilder::new()
            .controller_address(0x60)
            .build_with_transport(Box::new(mock));
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = PumpBuilder::new().build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn builder_fluent_chain() {
        let mock = MockTransport::new();
        let handle = PumpBuilder::new()
            .pump_address(0x61)
            .controller_address(0x21)
            .baud_rate(19_200)
            .response_timeout(Duration::from_millis(500))
            .max_retries(2)
            .poll_interval(Duration::from_secs(30))
            .repeat_interval(Duration::from_secs(25))
            .read_timeout(Duration::from_millis(20))
            .max_buffer(8192)
            .build_with_transport(Box::new(mock))
            .unwrap();

        let _ = handle.shutdown().await;
    }
}
