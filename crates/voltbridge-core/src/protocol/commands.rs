//! Control keystrokes
//!
//! The sensor firmware is menu-driven over the serial line: single ASCII
//! bytes start/stop streaming or walk a configuration menu. These mappings
//! are fixed by the firmware and are not negotiable at runtime.

use serde::{Deserialize, Serialize};

/// Resume streaming ('A')
pub const RESUME: u8 = b'A';

/// Stop streaming ('S')
pub const STOP: u8 = b'S';

/// Enter the configuration menu ('C'); the gain submenu is option '1'
pub const GAIN_MENU: u8 = b'C';

/// Select the gain submenu within the configuration menu
pub const GAIN_SUBMENU: u8 = b'1';

/// Enter the sample-rate menu ('F'); takes a value keystroke directly
pub const RATE_MENU: u8 = b'F';

/// Programmable gain amplifier level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    /// x1
    X1,
    /// x2
    X2,
    /// x64
    X64,
    /// x128
    X128,
}

impl Gain {
    /// Map a requested amplification level to a gain variant.
    /// Anything outside the four supported levels is rejected, including
    /// negative values (the field arrives as an arbitrary JSON integer).
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Gain::X1),
            2 => Some(Gain::X2),
            64 => Some(Gain::X64),
            128 => Some(Gain::X128),
            _ => None,
        }
    }

    /// The numeric amplification level
    pub fn level(&self) -> u32 {
        match self {
            Gain::X1 => 1,
            Gain::X2 => 2,
            Gain::X64 => 64,
            Gain::X128 => 128,
        }
    }

    /// The value keystroke the firmware expects in the gain submenu
    pub fn select_byte(&self) -> u8 {
        match self {
            Gain::X1 => b'0',
            Gain::X2 => b'1',
            Gain::X64 => b'2',
            Gain::X128 => b'3',
        }
    }
}

/// ADC output sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleRate {
    /// 10 Hz
    Hz10,
    /// 40 Hz
    Hz40,
    /// 640 Hz
    Hz640,
    /// 1280 Hz
    Hz1280,
}

impl SampleRate {
    /// Map a mode index (0-3) to a sample rate
    pub fn from_mode(mode: i64) -> Option<Self> {
        match mode {
            0 => Some(SampleRate::Hz10),
            1 => Some(SampleRate::Hz40),
            2 => Some(SampleRate::Hz640),
            3 => Some(SampleRate::Hz1280),
            _ => None,
        }
    }

    /// The mode index used on the control-plane side
    pub fn mode(&self) -> u8 {
        match self {
            SampleRate::Hz10 => 0,
            SampleRate::Hz40 => 1,
            SampleRate::Hz640 => 2,
            SampleRate::Hz1280 => 3,
        }
    }

    /// The rate in hertz
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz10 => 10,
            SampleRate::Hz40 => 40,
            SampleRate::Hz640 => 640,
            SampleRate::Hz1280 => 1280,
        }
    }

    /// The value keystroke the firmware expects in the rate menu
    pub fn select_byte(&self) -> u8 {
        b'0' + self.mode()
    }
}

/// A validated configuration command for the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Start (true) or stop (false) telemetry streaming
    SetEnabled(bool),
    /// Change the PGA level via the configuration menu
    SetGain(Gain),
    /// Change the output sample rate via the rate menu
    SetRate(SampleRate),
}
