//! Error types for saslib.
//!
//! All fallible operations across the library return [`Result<T>`], which
//! uses [`Error`] as the error type. The first five variants are the SAS
//! protocol conditions a caller is expected to distinguish; the rest cover
//! the transport and parameter failures around them.

/// The error type for all saslib operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("SAS port could not be opened: {0}")]
    Open(String),

    /// A read yielded no bytes where a response was mandatory.
    ///
    /// Raised on the CRC validation path of data commands and by the
    /// general poll. The gaming machine is powered off, disconnected, or
    /// not answering at the configured address.
    #[error("no SAS connection: no bytes received from the gaming machine")]
    NoConnection,

    /// The trailing CRC-16 of a response did not match its contents.
    #[error("bad CRC in response {0:02X?}")]
    BadCrc(Vec<u8>),

    /// The response does not belong to the command that was issued.
    ///
    /// The echoed address or opcode differs from what was sent, which
    /// means the line is out of step with the framing.
    #[error("response {response:02X?} does not answer command {command:02X?}")]
    BadCommandIsRunning {
        /// The frame that was sent, address first.
        command: Vec<u8>,
        /// The bytes that came back.
        response: Vec<u8>,
    },

    /// The general-poll byte is not a known exception code.
    #[error("unknown general poll response 0x{0:02X}")]
    BadGeneralPollResponse(u8),

    /// A transport-level error (serial port configuration, write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// A protocol-level error (short payload, invalid BCD digit).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Timed out waiting for data from the gaming machine.
    #[error("timeout waiting for response")]
    Timeout,

    /// An invalid parameter was passed to a command or the builder.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// No device address is known yet; `start()` has not completed.
    #[error("not connected")]
    NotConnected,

    /// The operation was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
