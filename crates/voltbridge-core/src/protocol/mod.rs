//! Serial Protocol
//!
//! Implements the sensor node's serial wire protocol: fixed 10-byte telemetry
//! frames in one direction, single-byte menu keystrokes in the other.
//!
//! The keystroke side is timing-sensitive: the firmware polls its menu at a
//! fixed cadence, so multi-step sequences need a settle delay between bytes.

pub mod commands;
mod error;
mod frame;
pub mod serial;
mod translator;

pub use commands::{ControlCommand, Gain, SampleRate};
pub use error::ProtocolError;
pub use frame::{
    decode_frame, encode_frame, FrameCodec, FrameEvent, FrameReceiver, Reading, FRAME_LEN,
    PREAMBLE, TRAILER,
};
pub use translator::CommandTranslator;

/// Default baud rate for the sensor link
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default settle delay between menu keystrokes in milliseconds.
/// Empirical; the firmware polls its menu roughly every 100ms and drops
/// keystrokes that arrive before it has re-entered the poll loop.
pub const DEFAULT_SETTLE_MS: u64 = 100;

/// Default idle threshold before the supervisor resends a resume byte
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 2000;
