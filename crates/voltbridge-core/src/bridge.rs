//! Bridge assembly
//!
//! Wires the pieces together over one serial stream: the receive loop owns
//! the read half and drives the frame receiver plus the liveness supervisor;
//! the dispatcher owns the command translator and the broker-facing channel
//! and can be cloned onto a separate control-message task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, trace, warn};

use crate::message::{OutboundMessage, SetReply, SetRequest, TelemetryPost};
use crate::protocol::{
    CommandTranslator, FrameEvent, FrameReceiver, ProtocolError, Reading, DEFAULT_BAUD_RATE,
    DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_SETTLE_MS,
};
use crate::state::BridgeState;
use crate::supervisor::LivenessSupervisor;

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Serial port name
    pub port_name: String,
    /// Baud rate of the sensor link
    pub baud_rate: u32,
    /// How long the line may stay quiet before the supervisor retries
    pub idle_timeout: Duration,
    /// Pause between menu keystrokes. Empirical firmware contract; treat as
    /// a minimum.
    pub settle_delay: Duration,
    /// Bounded read timeout of the receive loop; also the supervisor's
    /// check cadence
    pub read_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Routes inbound requests to the translator and decoded readings to the
/// outbound channel
pub struct Dispatcher<W> {
    translator: CommandTranslator<W>,
    state: Arc<BridgeState>,
    outbound: mpsc::Sender<OutboundMessage>,
    telemetry_seq: Arc<AtomicU64>,
}

impl<W> Clone for Dispatcher<W> {
    fn clone(&self) -> Self {
        Self {
            translator: self.translator.clone(),
            state: Arc::clone(&self.state),
            outbound: self.outbound.clone(),
            telemetry_seq: Arc::clone(&self.telemetry_seq),
        }
    }
}

impl<W: AsyncWrite + Unpin> Dispatcher<W> {
    /// Create a dispatcher over a shared serial writer and outbound channel
    pub fn new(
        translator: CommandTranslator<W>,
        state: Arc<BridgeState>,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        Self {
            translator,
            state,
            outbound,
            telemetry_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared state handle
    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Handle one raw inbound control message.
    ///
    /// Unparseable payloads are dropped without a reply (there is no
    /// correlation id to reply against). Every parsed request gets a
    /// success reply once processing completes, even when fields were
    /// skipped; per-field problems are logged instead.
    pub async fn handle_request(&self, raw: &[u8]) -> Result<(), ProtocolError> {
        let request: SetRequest = match serde_json::from_slice(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "dropping unparseable control request");
                return Ok(());
            }
        };

        debug!(id = %request.id, "control request received");
        for command in request.params.commands() {
            if let Err(e) = self.translator.apply(command).await {
                error!(id = %request.id, ?command, error = %e, "command failed");
            }
        }

        self.send(OutboundMessage::Reply(SetReply::success(request.id)))
            .await
    }

    /// Publish one decoded reading as telemetry
    pub async fn publish_reading(&self, reading: &Reading) -> Result<(), ProtocolError> {
        let seq = self.telemetry_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.send(OutboundMessage::Telemetry(TelemetryPost::from_reading(
            seq, reading,
        )))
        .await
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ProtocolError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| ProtocolError::ChannelClosed)
    }
}

/// Owns the read half of the serial link: reassembles frames, publishes
/// readings and drives the liveness supervisor
pub struct ReceiveLoop<R, W> {
    reader: R,
    receiver: FrameReceiver,
    supervisor: LivenessSupervisor<W>,
    dispatcher: Dispatcher<W>,
    state: Arc<BridgeState>,
    read_timeout: Duration,
}

impl<R, W> ReceiveLoop<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Create a receive loop; normally done through [`build_bridge`]
    pub fn new(
        reader: R,
        supervisor: LivenessSupervisor<W>,
        dispatcher: Dispatcher<W>,
        read_timeout: Duration,
    ) -> Self {
        let state = Arc::clone(dispatcher.state());
        Self {
            reader,
            receiver: FrameReceiver::new(),
            supervisor,
            dispatcher,
            state,
            read_timeout,
        }
    }

    /// Run until the serial stream closes or the outbound channel is
    /// dropped. Reads with a bounded timeout so the supervisor gets a
    /// check on every byte and on every quiet interval.
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        if self.state.is_collection_enabled() {
            self.supervisor.kick().await?;
        }

        let mut byte = [0u8; 1];
        loop {
            match tokio::time::timeout(self.read_timeout, self.reader.read(&mut byte)).await {
                Ok(Ok(0)) => {
                    debug!("serial stream closed");
                    return Ok(());
                }
                Ok(Ok(_)) => {
                    self.state.note_rx_byte();
                    self.supervisor.note_activity();
                    match self.receiver.push(byte[0]) {
                        FrameEvent::Frame(reading) => {
                            self.state.note_frame_decoded();
                            trace!(
                                voltage = reading.voltage,
                                gain = reading.gain_code,
                                "frame decoded"
                            );
                            self.dispatcher.publish_reading(&reading).await?;
                        }
                        FrameEvent::Malformed => {
                            self.state.note_malformed_frame();
                            warn!(
                                total = self.state.malformed_frames(),
                                "frame with bad trailer dropped"
                            );
                        }
                        FrameEvent::Pending => {}
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    // Read timeout; quiet line. Fall through to the tick.
                }
            }
            self.supervisor.tick().await?;
        }
    }
}

/// Split one serial stream into a receive loop and a dispatcher sharing the
/// same state and write channel.
///
/// The returned dispatcher is meant to be moved (or cloned) onto the
/// control-message task; the receive loop runs on its own task.
pub fn build_bridge<S>(
    config: &BridgeConfig,
    stream: S,
    outbound: mpsc::Sender<OutboundMessage>,
) -> (
    ReceiveLoop<io::ReadHalf<S>, io::WriteHalf<S>>,
    Dispatcher<io::WriteHalf<S>>,
)
where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = io::split(stream);
    let link = Arc::new(Mutex::new(writer));
    let state = Arc::new(BridgeState::new());

    let translator = CommandTranslator::new(
        Arc::clone(&link),
        Arc::clone(&state),
        config.settle_delay,
    );
    let supervisor = LivenessSupervisor::new(Arc::clone(&link), Arc::clone(&state), config.idle_timeout);
    let dispatcher = Dispatcher::new(translator, state, outbound);
    let rx_loop = ReceiveLoop::new(reader, supervisor, dispatcher.clone(), config.read_timeout);

    (rx_loop, dispatcher)
}
