//! Shared bridge state
//!
//! The receive loop and the control-message handler run concurrently and
//! coordinate through this object: whether collection is enabled, whether a
//! configuration keystroke sequence is in flight, and a handful of
//! observability counters. All fields are atomics; one tick of staleness is
//! acceptable everywhere they are read.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Flags and counters shared between the receive loop and the dispatcher
#[derive(Debug)]
pub struct BridgeState {
    /// True while the sensor is expected to be streaming
    collection_enabled: AtomicBool,
    /// Depth of in-flight configuration windows (0 = idle)
    configuring: AtomicU32,
    /// Frames that completed with a bad trailer and were dropped
    malformed_frames: AtomicU64,
    /// Frames decoded and handed to the publisher
    frames_decoded: AtomicU64,
    /// Raw bytes ingested from the serial line
    rx_bytes: AtomicU64,
    /// Resume bytes written by the liveness supervisor
    resume_retries: AtomicU64,
}

impl BridgeState {
    /// New state with collection enabled (the sensor streams by default)
    pub fn new() -> Self {
        Self {
            collection_enabled: AtomicBool::new(true),
            configuring: AtomicU32::new(0),
            malformed_frames: AtomicU64::new(0),
            frames_decoded: AtomicU64::new(0),
            rx_bytes: AtomicU64::new(0),
            resume_retries: AtomicU64::new(0),
        }
    }

    /// Whether the sensor should currently be streaming
    pub fn is_collection_enabled(&self) -> bool {
        self.collection_enabled.load(Ordering::SeqCst)
    }

    /// Flip collection on or off (only the enable/disable command does this)
    pub fn set_collection_enabled(&self, enabled: bool) {
        self.collection_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether a configuration keystroke sequence is in flight
    pub fn is_configuring(&self) -> bool {
        self.configuring.load(Ordering::SeqCst) > 0
    }

    /// Open a configuring window. The window closes when the guard drops,
    /// on every exit path including write failures.
    pub fn begin_configuring(&self) -> ConfiguringGuard<'_> {
        self.configuring.fetch_add(1, Ordering::SeqCst);
        ConfiguringGuard { state: self }
    }

    /// Record one ingested serial byte
    pub fn note_rx_byte(&self) {
        self.rx_bytes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame dropped for a trailer mismatch
    pub fn note_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a decoded frame
    pub fn note_frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a supervisor resume retry
    pub fn note_resume_retry(&self) {
        self.resume_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Total frames dropped for a trailer mismatch
    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames.load(Ordering::Relaxed)
    }

    /// Total frames decoded
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    /// Total raw bytes ingested
    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    /// Total resume retries written by the supervisor
    pub fn resume_retries(&self) -> u64 {
        self.resume_retries.load(Ordering::Relaxed)
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII handle for an in-flight configuration window
#[derive(Debug)]
pub struct ConfiguringGuard<'a> {
    state: &'a BridgeState,
}

impl Drop for ConfiguringGuard<'_> {
    fn drop(&mut self) {
        self.state.configuring.fetch_sub(1, Ordering::SeqCst);
    }
}
