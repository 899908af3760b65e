//! Liveness supervision
//!
//! The sensor occasionally stops streaming (power glitch, missed resume
//! keystroke after a menu walk). The supervisor tracks the time since the
//! last received byte and, when the line has been quiet for longer than the
//! idle threshold, writes a single resume byte. Each retry and each received
//! byte resets the window, so there is at most one retry per threshold
//! window and no retry storm.
//!
//! While a configuration sequence is in flight the supervisor stands down
//! and resets its timer instead, so it never races the translator.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::protocol::{commands, ProtocolError};
use crate::state::BridgeState;

/// Keeps the sensor transmitting by retrying the resume keystroke
pub struct LivenessSupervisor<W> {
    link: Arc<Mutex<W>>,
    state: Arc<BridgeState>,
    idle_timeout: Duration,
    last_rx: Instant,
}

impl<W: AsyncWrite + Unpin> LivenessSupervisor<W> {
    /// Create a supervisor over a shared serial writer
    pub fn new(link: Arc<Mutex<W>>, state: Arc<BridgeState>, idle_timeout: Duration) -> Self {
        Self {
            link,
            state,
            idle_timeout,
            last_rx: Instant::now(),
        }
    }

    /// Note a received byte. Called for every ingested byte regardless of
    /// frame validity.
    pub fn note_activity(&mut self) {
        self.last_rx = Instant::now();
    }

    /// Run one supervision check. Returns whether a resume byte was written.
    ///
    /// Driven by the receive loop on every byte and every read timeout, so
    /// the check cadence is bounded by the loop's read timeout.
    pub async fn tick(&mut self) -> Result<bool, ProtocolError> {
        if !self.state.is_collection_enabled() {
            return Ok(false);
        }
        if self.state.is_configuring() {
            // Stand down and restart the window so the retry cannot fire
            // right as the sequence finishes.
            self.last_rx = Instant::now();
            return Ok(false);
        }
        if self.last_rx.elapsed() <= self.idle_timeout {
            return Ok(false);
        }

        let mut port = self.link.lock().await;
        // The flag may have been raised while we waited for the writer;
        // the check and the write form one critical section under the lock.
        if self.state.is_configuring() {
            self.last_rx = Instant::now();
            return Ok(false);
        }
        warn!(
            idle_ms = self.last_rx.elapsed().as_millis() as u64,
            "sensor idle, resending resume keystroke"
        );
        port.write_all(&[commands::RESUME]).await?;
        port.flush().await?;
        drop(port);

        self.last_rx = Instant::now();
        self.state.note_resume_retry();
        Ok(true)
    }

    /// Write one resume byte unconditionally and reset the idle window.
    /// Used once at startup to kick a sensor that booted quiet.
    pub async fn kick(&mut self) -> Result<(), ProtocolError> {
        let mut port = self.link.lock().await;
        port.write_all(&[commands::RESUME]).await?;
        port.flush().await?;
        drop(port);
        self.last_rx = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (
        LivenessSupervisor<Vec<u8>>,
        Arc<Mutex<Vec<u8>>>,
        Arc<BridgeState>,
    ) {
        let link = Arc::new(Mutex::new(Vec::new()));
        let state = Arc::new(BridgeState::new());
        let supervisor = LivenessSupervisor::new(
            Arc::clone(&link),
            Arc::clone(&state),
            Duration::from_secs(2),
        );
        (supervisor, link, state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_idle_threshold() {
        let (mut supervisor, link, state) = setup();

        tokio::time::advance(Duration::from_millis(2100)).await;
        assert!(supervisor.tick().await.unwrap());
        assert_eq!(*link.lock().await, vec![b'A']);
        assert_eq!(state.resume_retries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_duplicate_retry_within_window() {
        let (mut supervisor, link, _state) = setup();

        tokio::time::advance(Duration::from_millis(2100)).await;
        assert!(supervisor.tick().await.unwrap());

        // Further ticks inside the fresh window stay quiet
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!supervisor.tick().await.unwrap());
        tokio::time::advance(Duration::from_millis(1400)).await;
        assert!(!supervisor.tick().await.unwrap());
        assert_eq!(link.lock().await.len(), 1);

        // And the next window fires again
        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(supervisor.tick().await.unwrap());
        assert_eq!(link.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_window() {
        let (mut supervisor, link, _state) = setup();

        tokio::time::advance(Duration::from_millis(1900)).await;
        supervisor.note_activity();
        tokio::time::advance(Duration::from_millis(1900)).await;
        assert!(!supervisor.tick().await.unwrap());
        assert!(link.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_collection_suppresses_retry() {
        let (mut supervisor, link, state) = setup();
        state.set_collection_enabled(false);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!supervisor.tick().await.unwrap());
        assert!(link.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_configuring_suppresses_retry_and_resets_timer() {
        let (mut supervisor, link, state) = setup();

        let window = state.begin_configuring();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!supervisor.tick().await.unwrap());
        assert!(link.lock().await.is_empty());
        drop(window);

        // The stand-down reset the timer, so the retry needs a full window
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(!supervisor.tick().await.unwrap());
        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(supervisor.tick().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_kick_writes_resume() {
        let (mut supervisor, link, _state) = setup();
        supervisor.kick().await.unwrap();
        assert_eq!(*link.lock().await, vec![b'A']);

        // kick resets the window too
        tokio::time::advance(Duration::from_millis(1900)).await;
        assert!(!supervisor.tick().await.unwrap());
    }
}
