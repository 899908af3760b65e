//! Command translation
//!
//! Turns a validated [`ControlCommand`] into the serial keystrokes the
//! firmware expects. Gain and rate changes are multi-step menu walks with a
//! settle delay between keystrokes; the firmware polls its menu and drops
//! bytes that arrive early, so the delay is part of the contract and is
//! never shortened.
//!
//! The translator shares the write half of the serial link with the liveness
//! supervisor. It holds the writer lock for the entire sequence, so two
//! concurrent translations can never interleave their bytes on the wire and
//! the supervisor can never inject a resume byte mid-sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::commands::{self, ControlCommand, Gain, SampleRate};
use super::ProtocolError;
use crate::state::BridgeState;

/// Translates configuration commands into timed keystroke sequences
pub struct CommandTranslator<W> {
    link: Arc<Mutex<W>>,
    state: Arc<BridgeState>,
    settle_delay: Duration,
}

impl<W> Clone for CommandTranslator<W> {
    fn clone(&self) -> Self {
        Self {
            link: Arc::clone(&self.link),
            state: Arc::clone(&self.state),
            settle_delay: self.settle_delay,
        }
    }
}

impl<W: AsyncWrite + Unpin> CommandTranslator<W> {
    /// Create a translator over a shared serial writer
    pub fn new(link: Arc<Mutex<W>>, state: Arc<BridgeState>, settle_delay: Duration) -> Self {
        Self {
            link,
            state,
            settle_delay,
        }
    }

    /// Apply one command to the sensor.
    ///
    /// Multi-step sequences run to completion once started; there is no
    /// cancellation. On a write failure the configuring window still closes.
    pub async fn apply(&self, cmd: ControlCommand) -> Result<(), ProtocolError> {
        match cmd {
            ControlCommand::SetEnabled(enabled) => self.set_enabled(enabled).await,
            ControlCommand::SetGain(gain) => self.set_gain(gain).await,
            ControlCommand::SetRate(rate) => self.set_rate(rate).await,
        }
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), ProtocolError> {
        let byte = if enabled {
            commands::RESUME
        } else {
            commands::STOP
        };
        {
            let mut port = self.link.lock().await;
            write_byte(&mut *port, byte).await?;
        }
        self.state.set_collection_enabled(enabled);
        info!(enabled, "collection state changed");
        Ok(())
    }

    async fn set_gain(&self, gain: Gain) -> Result<(), ProtocolError> {
        // Raise the configuring flag before touching the wire; the guard
        // lowers it on every exit path.
        let _window = self.state.begin_configuring();
        let mut port = self.link.lock().await;

        write_byte(&mut *port, commands::GAIN_MENU).await?;
        tokio::time::sleep(self.settle_delay).await;
        write_byte(&mut *port, commands::GAIN_SUBMENU).await?;
        tokio::time::sleep(self.settle_delay).await;
        write_byte(&mut *port, gain.select_byte()).await?;

        info!(level = gain.level(), "gain sequence sent");
        Ok(())
    }

    async fn set_rate(&self, rate: SampleRate) -> Result<(), ProtocolError> {
        let _window = self.state.begin_configuring();
        let mut port = self.link.lock().await;

        write_byte(&mut *port, commands::RATE_MENU).await?;
        tokio::time::sleep(self.settle_delay).await;
        write_byte(&mut *port, rate.select_byte()).await?;

        info!(hz = rate.hz(), "sample rate sequence sent");
        Ok(())
    }
}

async fn write_byte<W: AsyncWrite + Unpin>(port: &mut W, byte: u8) -> Result<(), ProtocolError> {
    port.write_all(&[byte]).await?;
    port.flush().await?;
    debug!(keystroke = %(byte as char), "keystroke written");
    Ok(())
}
