//! Protocol errors

use thiserror::Error;

/// Errors that can occur while bridging the sensor link
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// The outbound message channel was closed by the consumer
    #[error("Outbound channel closed")]
    ChannelClosed,

    /// An I/O error on the serial stream
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
