//! # VoltBridge Core Library
//!
//! Core functionality for the VoltBridge sensor gateway.

#![warn(missing_docs)]

//!
//! This library bridges a CS1237-class precision ADC sensor node (serial,
//! menu-driven firmware) to a cloud control plane:
//!
//! - Frame reassembly and decoding of the sensor's 10-byte telemetry frames
//! - Liveness supervision (resume retry when the sensor goes quiet)
//! - Translation of structured configuration requests into timed keystroke
//!   sequences on the serial line
//! - Dispatching of decoded readings and request acknowledgements to the
//!   broker-facing side
//!
//! The broker session itself and the sensor firmware are external
//! collaborators; this crate only speaks raw bytes on one side and
//! structured JSON messages on the other.
//!
//! ## Example
//!
//! ```rust,ignore
//! use voltbridge_core::bridge::{build_bridge, BridgeConfig};
//! use voltbridge_core::protocol::serial;
//!
//! let config = BridgeConfig::default();
//! let port = serial::open_port("/dev/ttyUSB0", config.baud_rate)?;
//! let (outbound_tx, outbound_rx) = tokio::sync::mpsc::channel(64);
//! let (rx_loop, dispatcher) = build_bridge(&config, port, outbound_tx);
//! ```

pub mod bridge;
pub mod message;
pub mod protocol;
pub mod state;
pub mod supervisor;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bridge::{build_bridge, BridgeConfig, Dispatcher, ReceiveLoop};
    pub use crate::message::{OutboundMessage, SetReply, SetRequest, TelemetryPost};
    pub use crate::protocol::{
        ControlCommand, FrameEvent, FrameReceiver, Gain, ProtocolError, Reading, SampleRate,
    };
    pub use crate::state::BridgeState;
    pub use crate::supervisor::LivenessSupervisor;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
