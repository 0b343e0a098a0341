//! Half-duplex RS-485 serial transport.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for RS-485 transceivers attached via USB adapters or
//! on-board UARTs.
//!
//! RS-485 is a shared differential pair: every device on the bus hears every
//! byte, and only one driver may be enabled at a time. Adapters that do not
//! switch direction themselves route the transceiver's DE/RE pin to the RTS
//! line, so a write must bracket the payload with driver-enable assertion,
//! a short guard interval on each side, and a full drain of the UART before
//! the line is released back to listen mode. Releasing early truncates the
//! tail of the frame on the wire; releasing late collides with the reply.
//!
//! # Example
//!
//! ```no_run
//! use pumpbus_transport::SerialTransport;
//! use pumpbus_core::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> pumpbus_core::Result<()> {
//! // Pool controllers talk at 9600 8N1.
//! let mut transport = SerialTransport::open("/dev/ttyUSB0", 9600).await?;
//!
//! // Status query to pump 1 from remote controller 0x20.
//! transport.send(&[0xFF, 0x00, 0xFF, 0xA5, 0x00, 0x60, 0x20, 0x07, 0x00, 0x01, 0x2C]).await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_millis(100)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use pumpbus_core::error::{Error, Result};
use pumpbus_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

/// How the transceiver's driver-enable (DE/RE) pin is controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEnable {
    /// The adapter switches direction itself (most USB RS-485 dongles).
    /// No line toggling; guard delays still apply around the write.
    Auto,
    /// DE/RE is wired to RTS, asserted high to transmit.
    Rts,
    /// DE/RE is wired to RTS with inverted polarity.
    RtsActiveLow,
}

/// Serial port configuration.
///
/// Defaults match Pentair pool equipment: 9600 baud, 8 data bits, 1 stop
/// bit, no parity, no flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate. Pool controllers use 9600; some aftermarket gear 19200.
    pub baud_rate: u32,
    /// Number of data bits (typically 8).
    pub data_bits: DataBits,
    /// Number of stop bits (typically 1).
    pub stop_bits: StopBits,
    /// Parity checking (always None on the Pentair bus).
    pub parity: Parity,
    /// Flow control (always None — RTS belongs to the transceiver).
    pub flow_control: FlowControl,
    /// Driver-enable control method.
    pub driver_enable: DriverEnable,
    /// Delay between asserting driver-enable and the first byte.
    pub pre_tx_guard: Duration,
    /// Delay between the last byte draining and releasing the line.
    pub post_tx_guard: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            driver_enable: DriverEnable::Rts,
            pre_tx_guard: Duration::from_micros(100),
            post_tx_guard: Duration::from_micros(100),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => tokio_serial::DataBits::Five,
            DataBits::Six => tokio_serial::DataBits::Six,
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for tokio_serial::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => tokio_serial::StopBits::One,
            StopBits::Two => tokio_serial::StopBits::Two,
        }
    }
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for tokio_serial::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

/// Half-duplex RS-485 serial transport.
///
/// Implements the [`Transport`] trait with explicit transmit/receive
/// turnaround. The port opens in listen mode and returns to listen mode
/// after every send.
pub struct SerialTransport {
    /// The underlying serial port stream.
    port: Option<SerialStream>,
    /// Port name for logging/debugging.
    port_name: String,
    /// Turnaround configuration.
    config: SerialConfig,
}

impl SerialTransport {
    /// Open a serial port with the given baud rate and default settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    /// * `baud_rate` - Baud rate (9600 for Pentair equipment)
    pub async fn open(port: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig {
            baud_rate,
            ..Default::default()
        };
        Self::open_with_config(port, config).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        tracing::debug!(
            port = %port,
            baud_rate = config.baud_rate,
            data_bits = ?config.data_bits,
            stop_bits = ?config.stop_bits,
            parity = ?config.parity,
            driver_enable = ?config.driver_enable,
            "Opening serial port"
        );

        let mut serial_stream = tokio_serial::new(port, config.baud_rate)
            .data_bits(config.data_bits.into())
            .stop_bits(config.stop_bits.into())
            .parity(config.parity.into())
            .flow_control(config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %port, error = %e, "Failed to open serial port");
                Error::Transport(format!("Failed to open serial port {}: {}", port, e))
            })?;

        // Start in listen mode. The OS commonly asserts RTS/DTR on open,
        // which would hold the transceiver's driver enabled and jam the bus
        // for every other device.
        let rts_idle = matches!(config.driver_enable, DriverEnable::RtsActiveLow);
        if let Err(e) = serial_stream.write_request_to_send(rts_idle) {
            tracing::warn!(port = %port, error = %e, "Failed to release RTS");
        }
        if let Err(e) = serial_stream.write_data_terminal_ready(false) {
            tracing::warn!(port = %port, error = %e, "Failed to de-assert DTR");
        }

        tracing::info!(port = %port, baud_rate = config.baud_rate, "Serial port opened");

        Ok(Self {
            port: Some(serial_stream),
            port_name: port.to_string(),
            config,
        })
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Set the driver-enable line to transmit or listen.
    fn set_driver(&mut self, transmit: bool) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        let level = match self.config.driver_enable {
            DriverEnable::Auto => return Ok(()),
            DriverEnable::Rts => transmit,
            DriverEnable::RtsActiveLow => !transmit,
        };
        port.write_request_to_send(level).map_err(|e| {
            tracing::error!(port = %self.port_name, error = %e, "Failed to toggle driver enable");
            Error::Transport(format!("driver-enable toggle failed: {e}"))
        })
    }

    fn map_io_error(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::NotConnected
        {
            Error::ConnectionLost
        } else {
            Error::Io(e)
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.port.is_none() {
            return Err(Error::NotConnected);
        }

        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            "Sending data"
        );

        // Claim the bus: driver on, then a guard interval so the
        // transceiver settles before the first start bit.
        self.set_driver(true)?;
        tokio::time::sleep(self.config.pre_tx_guard).await;

        let write_result = {
            let port = self.port.as_mut().ok_or(Error::NotConnected)?;
            match port.write_all(data).await {
                // Block until the UART has drained; the driver must stay
                // enabled until the last stop bit is on the wire.
                Ok(()) => port.flush().await,
                Err(e) => Err(e),
            }
        };

        // Release the bus even if the write failed, then surface the error.
        tokio::time::sleep(self.config.post_tx_guard).await;
        self.set_driver(false)?;

        if let Err(e) = write_result {
            tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
            return Err(self.map_io_error(e));
        }

        tracing::trace!(port = %self.port_name, "Data sent, line released");
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            port = %self.port_name,
            buf_len = buf.len(),
            timeout_ms = timeout.as_millis(),
            "Waiting for data"
        );

        let result = tokio::time::timeout(timeout, port.read(buf)).await;

        match result {
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                if e.kind() == std::io::ErrorKind::BrokenPipe
                    || e.kind() == std::io::ErrorKind::NotConnected
                {
                    Err(Error::ConnectionLost)
                } else {
                    Err(Error::Io(e))
                }
            }
            Err(_) => {
                tracing::trace!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");

            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }

            tracing::info!(port = %self.port_name, "Serial port closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            tracing::debug!(port = %self.port_name, "SerialTransport dropped, closing port");
        }
    }
}
