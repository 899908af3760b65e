//! Broker-facing message types
//!
//! JSON shapes follow the thing-model convention of the control plane the
//! device shipped against: a property-set request carrying optional fields,
//! a set reply keyed by the request's correlation id, and a property post
//! for each telemetry reading.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::protocol::{ControlCommand, Gain, Reading, SampleRate};

/// Inbound property-set request
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// Correlation id; the reply echoes it back
    pub id: String,
    /// Protocol version tag, ignored on ingest
    #[serde(default)]
    pub version: Option<String>,
    /// Requested property values
    #[serde(default)]
    pub params: SetParams,
}

/// Recognized fields of a property-set request. Anything else in `params`
/// is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetParams {
    /// Start/stop collection; accepts `true`/`false` or `1`/`0`
    #[serde(default)]
    pub enable: Option<EnableFlag>,
    /// Requested PGA level (1, 2, 64 or 128); anything else is skipped,
    /// not a parse error
    #[serde(default)]
    pub pga: Option<i64>,
    /// Requested sample-rate mode (0-3)
    #[serde(default)]
    pub mode: Option<i64>,
}

/// The `enable` field as sent by the platform: boolean or 0/1 integer
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum EnableFlag {
    /// JSON boolean form
    Bool(bool),
    /// JSON integer form; 1 enables, anything else disables
    Number(i64),
}

impl EnableFlag {
    /// Collapse to a plain bool
    pub fn as_bool(self) -> bool {
        match self {
            EnableFlag::Bool(b) => b,
            EnableFlag::Number(n) => n == 1,
        }
    }
}

impl SetParams {
    /// Extract the commands this request asks for. Each recognized field is
    /// independent; out-of-range values are skipped with a warning and do
    /// not affect the other fields.
    pub fn commands(&self) -> Vec<ControlCommand> {
        let mut commands = Vec::new();
        if let Some(enable) = self.enable {
            commands.push(ControlCommand::SetEnabled(enable.as_bool()));
        }
        if let Some(level) = self.pga {
            match Gain::from_level(level) {
                Some(gain) => commands.push(ControlCommand::SetGain(gain)),
                None => warn!(level, "unsupported pga level, skipping field"),
            }
        }
        if let Some(mode) = self.mode {
            match SampleRate::from_mode(mode) {
                Some(rate) => commands.push(ControlCommand::SetRate(rate)),
                None => warn!(mode, "unsupported rate mode, skipping field"),
            }
        }
        commands
    }
}

/// Outbound reply to a property-set request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReply {
    /// Correlation id echoed from the request
    pub id: String,
    /// Result code; 200 for success
    pub code: u16,
    /// Human-readable result
    pub msg: String,
}

impl SetReply {
    /// Success reply for the given correlation id
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: 200,
            msg: "success".to_string(),
        }
    }
}

/// Outbound telemetry post for one decoded reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPost {
    /// Message id, unique per gateway run
    pub id: String,
    /// Thing-model version tag
    pub version: String,
    /// Posted property values
    pub params: TelemetryParams,
}

/// Property block of a telemetry post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryParams {
    /// Measured voltage
    pub voltage: PropertyValue<f32>,
    /// PGA level the sensor reported alongside the sample
    pub pga: PropertyValue<u16>,
}

/// Thing-model `{ "value": ... }` wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue<T> {
    /// The wrapped value
    pub value: T,
}

impl TelemetryPost {
    /// Build a post from a decoded reading and a per-run sequence number
    pub fn from_reading(seq: u64, reading: &Reading) -> Self {
        Self {
            id: seq.to_string(),
            version: "1.0".to_string(),
            params: TelemetryParams {
                voltage: PropertyValue {
                    value: reading.voltage,
                },
                pga: PropertyValue {
                    value: reading.gain_code,
                },
            },
        }
    }
}

/// Any message the bridge hands to the broker-facing side
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// A telemetry property post
    Telemetry(TelemetryPost),
    /// A property-set reply
    Reply(SetReply),
}
