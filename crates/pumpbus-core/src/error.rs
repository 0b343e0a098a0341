//! Error types for pumpbus.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport-layer, protocol-layer, and
//! scheduling errors are all captured here.

/// The error type for all pumpbus operations.
///
/// Variants cover the failure modes encountered when driving a pump on a
/// shared RS-485 bus: physical transport failures, frame decode errors,
/// response timeouts, and scheduling rejections. None of these are fatal to
/// the process — every failure is recoverable at the next scheduling tick.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A transport-level error (serial port open/configure failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (malformed frame, unexpected response).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for a response from the pump.
    ///
    /// This typically indicates the pump is powered off, the bus wiring is
    /// wrong, or another controller is holding the pump in local mode.
    #[error("timeout waiting for response")]
    Timeout,

    /// A command was submitted while another is still in flight.
    ///
    /// Status polls are exempt — they queue behind the outstanding command.
    #[error("a command is already awaiting a response")]
    Busy,

    /// A frame payload exceeded the 255-byte wire limit at encode time.
    #[error("payload too large: {0} bytes (max 255)")]
    PayloadTooLarge(usize),

    /// An invalid parameter was passed to a command builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No connection to the bus has been established.
    #[error("not connected")]
    NotConnected,

    /// The connection to the bus was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("port busy".into());
        assert_eq!(e.to_string(), "transport error: port busy");
    }

    #[test]
    fn error_display_protocol() {
        let e = Error::Protocol("bad frame".into());
        assert_eq!(e.to_string(), "protocol error: bad frame");
    }

    #[test]
    fn error_display_timeout() {
        let e = Error::Timeout;
        assert_eq!(e.to_string(), "timeout waiting for response");
    }

    #[test]
    fn error_display_busy() {
        let e = Error::Busy;
        assert_eq!(e.to_string(), "a command is already awaiting a response");
    }

    #[test]
    fn error_display_payload_too_large() {
        let e = Error::PayloadTooLarge(300);
        assert_eq!(e.to_string(), "payload too large: 300 bytes (max 255)");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("rpm out of range".into());
        assert_eq!(e.to_string(), "invalid parameter: rpm out of range");
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("pipe broken"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
