//! Telemetry frame reassembly and decoding
//!
//! The sensor emits fixed 10-byte frames:
//! - 2 bytes: preamble `AA 55`
//! - 4 bytes: voltage, float32 little-endian
//! - 2 bytes: gain code, u16 little-endian
//! - 2 bytes: trailer `0D 0A`
//!
//! The receiver is a byte-at-a-time state machine with no I/O of its own.
//! It resynchronizes on the preamble within at most one frame length of any
//! corruption and never emits a partially decoded reading.

use chrono::{DateTime, Utc};
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

use super::ProtocolError;

/// Total frame length in bytes
pub const FRAME_LEN: usize = 10;

/// Frame preamble bytes
pub const PREAMBLE: [u8; 2] = [0xAA, 0x55];

/// Frame trailer bytes
pub const TRAILER: [u8; 2] = [0x0D, 0x0A];

/// One decoded telemetry sample
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Measured voltage in volts
    pub voltage: f32,
    /// Gain code reported by the sensor (PGA level)
    pub gain_code: u16,
    /// Time the frame was decoded on the gateway
    pub timestamp: DateTime<Utc>,
}

/// Result of feeding one byte into the receiver
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    /// Byte consumed, no complete frame yet
    Pending,
    /// A valid frame completed and decoded
    Frame(Reading),
    /// A complete frame arrived with a bad trailer and was discarded
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiverState {
    WaitPreamble1,
    WaitPreamble2,
    Collecting,
}

/// Byte-stream frame reassembly state machine
#[derive(Debug)]
pub struct FrameReceiver {
    state: ReceiverState,
    buf: [u8; FRAME_LEN],
    filled: usize,
}

impl FrameReceiver {
    /// Create a receiver hunting for the first preamble byte
    pub fn new() -> Self {
        Self {
            state: ReceiverState::WaitPreamble1,
            buf: [0u8; FRAME_LEN],
            filled: 0,
        }
    }

    /// Feed one byte through the state machine.
    ///
    /// A repeated first preamble byte while waiting for the second is treated
    /// as a fresh preamble start, so `AA AA 55 ...` still locks on.
    pub fn push(&mut self, byte: u8) -> FrameEvent {
        match self.state {
            ReceiverState::WaitPreamble1 => {
                if byte == PREAMBLE[0] {
                    self.buf[0] = byte;
                    self.state = ReceiverState::WaitPreamble2;
                }
                FrameEvent::Pending
            }
            ReceiverState::WaitPreamble2 => {
                if byte == PREAMBLE[1] {
                    self.buf[1] = byte;
                    self.filled = 2;
                    self.state = ReceiverState::Collecting;
                } else if byte != PREAMBLE[0] {
                    self.state = ReceiverState::WaitPreamble1;
                }
                FrameEvent::Pending
            }
            ReceiverState::Collecting => {
                self.buf[self.filled] = byte;
                self.filled += 1;
                if self.filled < FRAME_LEN {
                    return FrameEvent::Pending;
                }
                self.state = ReceiverState::WaitPreamble1;
                match decode_frame(&self.buf) {
                    Some((voltage, gain_code)) => FrameEvent::Frame(Reading {
                        voltage,
                        gain_code,
                        timestamp: Utc::now(),
                    }),
                    None => FrameEvent::Malformed,
                }
            }
        }
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a complete frame buffer into `(voltage, gain_code)`.
///
/// Returns `None` when the trailer does not match. The preamble is not
/// re-checked here; the receiver only collects after locking onto it.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> Option<(f32, u16)> {
    if frame[8..10] != TRAILER {
        return None;
    }
    let voltage = f32::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);
    let gain_code = u16::from_le_bytes([frame[6], frame[7]]);
    Some((voltage, gain_code))
}

/// Encode a frame the way the sensor firmware does (used by tests and
/// simulators)
pub fn encode_frame(voltage: f32, gain_code: u16) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..2].copy_from_slice(&PREAMBLE);
    frame[2..6].copy_from_slice(&voltage.to_le_bytes());
    frame[6..8].copy_from_slice(&gain_code.to_le_bytes());
    frame[8..10].copy_from_slice(&TRAILER);
    frame
}

/// `tokio_util` codec adapter over [`FrameReceiver`], for sitting the
/// receiver on a `FramedRead` stream
#[derive(Debug, Default)]
pub struct FrameCodec {
    receiver: FrameReceiver,
    malformed: u64,
}

impl FrameCodec {
    /// Frames dropped for a trailer mismatch since the codec was created
    pub fn malformed_frames(&self) -> u64 {
        self.malformed
    }
}

impl Decoder for FrameCodec {
    type Item = Reading;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Reading>, ProtocolError> {
        while src.has_remaining() {
            match self.receiver.push(src.get_u8()) {
                FrameEvent::Frame(reading) => return Ok(Some(reading)),
                FrameEvent::Malformed => {
                    self.malformed += 1;
                    warn!(total = self.malformed, "frame with bad trailer dropped");
                }
                FrameEvent::Pending => {}
            }
        }
        Ok(None)
    }
}
