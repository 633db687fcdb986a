//! Connection state machine over the inference socket.
//!
//! [`StreamTransport`] owns the lifecycle of the bidirectional stream: it
//! dials through a [`WireConnector`], performs the setup handshake, buffers
//! audio frames while disconnected, and transparently re-establishes the
//! socket when it drops mid-session.
//!
//! ```text
//!          connect()                 setupComplete
//!  Closed ----------> Connecting ------------------> Open
//!    ^                    |  ^                        |
//!    |    attempts        |  |  socket lost           |
//!  close()  exhausted     v  +------------------------+
//!    |                  Failed
//!    +--- close() --------+
//! ```
//!
//! `send_frame` never blocks and never fails: while the stream is anything
//! other than `Open`, frames land in a bounded queue that evicts its oldest
//! entry on overflow.  Queued frames are flushed in arrival order the moment
//! the handshake completes.  While the stream is open a saturated write
//! buffer drops the frame instead, so frames on the wire always stay in
//! production order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

use crate::audio::AudioFrame;
use crate::config::TransportConfig;

use super::connector::{WireConnector, WireSocket};
use super::protocol::{audio_message, endpoint_url, setup_message, turn_message, ServerMessage};
use super::queue::FrameQueue;

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No API key configured; the endpoint URL cannot be built.
    #[error("no API key configured")]
    MissingApiKey,

    /// The socket opened but the setup acknowledgement never arrived.
    #[error("setup handshake timed out after {0}s")]
    ConnectTimeout(u64),

    /// The socket could not be established or dropped during the handshake.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The service answered the setup message with something other than an
    /// acknowledgement.
    #[error("setup rejected: {0}")]
    HandshakeRejected(String),

    /// An operation that requires an open stream was called without one.
    #[error("stream is not connected")]
    NotConnected,
}

/// What a subscriber receives from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A parsed server message, delivered in arrival order.
    Message(ServerMessage),
    /// The stream dropped and automatic re-establishment gave up.  Emitted
    /// at most once per loss.
    Lost(TransportError),
}

/// Externally observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Failed,
}

// ---------------------------------------------------------------------------
// StreamTransport
// ---------------------------------------------------------------------------

/// Capacity of the subscriber event channel.
const EVENT_CAPACITY: usize = 64;

struct Shared {
    state: ConnectionState,
    queue: FrameQueue,
    /// Write half of the live socket; `None` unless `state == Open`.
    outbound: Option<mpsc::Sender<String>>,
    /// Current subscriber, last `subscribe()` wins.
    events: Option<mpsc::Sender<TransportEvent>>,
    /// Bumped by `close()`; reader tasks from earlier generations exit
    /// instead of reconnecting.
    generation: u64,
}

/// Handle to the streaming connection.  Cheap to clone; all clones share
/// one connection, one frame queue, and one subscriber slot.
#[derive(Clone)]
pub struct StreamTransport {
    config: TransportConfig,
    connector: Arc<dyn WireConnector>,
    shared: Arc<Mutex<Shared>>,
}

impl StreamTransport {
    pub fn new(config: TransportConfig, connector: Arc<dyn WireConnector>) -> Self {
        let queue = FrameQueue::new(config.queue_frames);
        Self {
            config,
            connector,
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Closed,
                queue,
                outbound: None,
                events: None,
                generation: 0,
            })),
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.shared.lock().await.state
    }

    /// Establish the stream.  A no-op when already open.
    ///
    /// Makes up to `max_attempts` connection attempts, sleeping
    /// `attempt * backoff_ms` after each failure.  On exhaustion the state
    /// becomes [`ConnectionState::Failed`], queued frames are discarded, and
    /// the last attempt's error is returned.  A later `connect()` starts a
    /// fresh attempt cycle.
    pub async fn connect(&self) -> Result<(), TransportError> {
        self.establish().await
    }

    /// Replace the event subscriber.  The previous subscriber's channel is
    /// closed; only the most recent receiver sees subsequent events.
    pub async fn subscribe(&self) -> mpsc::Receiver<TransportEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        self.shared.lock().await.events = Some(tx);
        rx
    }

    /// Hand a frame to the stream.  Never blocks, never fails.
    ///
    /// While the stream is open the frame goes straight to the socket; a
    /// momentarily full write buffer drops it, because parking it in the
    /// queue behind frames that bypass the queue would reorder the audio.
    /// While the stream is not open the frame is queued (oldest evicted at
    /// capacity) and flushed in order on the next successful connect.
    pub async fn send_frame(&self, frame: AudioFrame) {
        let mut shared = self.shared.lock().await;
        if shared.state == ConnectionState::Open {
            if let Some(out) = &shared.outbound {
                if let Err(e) = out.try_send(audio_message(&frame).to_string()) {
                    log::debug!("outbound saturated, frame dropped: {e}");
                }
                return;
            }
        }
        shared.queue.push(frame);
    }

    /// Send an end-of-turn text message, prompting the service to respond.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotConnected`] when the stream is not open.
    pub async fn send_turn(&self, text: &str) -> Result<(), TransportError> {
        let out = {
            let shared = self.shared.lock().await;
            match (&shared.state, &shared.outbound) {
                (ConnectionState::Open, Some(out)) => out.clone(),
                _ => return Err(TransportError::NotConnected),
            }
        };
        out.send(turn_message(text).to_string())
            .await
            .map_err(|_| TransportError::NotConnected)
    }

    /// Tear the stream down.  Queued frames are discarded and any in-flight
    /// reader task is invalidated; no reconnection is attempted.
    pub async fn close(&self) {
        let mut shared = self.shared.lock().await;
        shared.generation += 1;
        shared.state = ConnectionState::Closed;
        shared.outbound = None;
        shared.queue.clear();
        log::info!("stream closed");
    }

    // -- connection internals ------------------------------------------------

    async fn establish(&self) -> Result<(), TransportError> {
        {
            let mut shared = self.shared.lock().await;
            if shared.state == ConnectionState::Open {
                return Ok(());
            }
            shared.state = ConnectionState::Connecting;
        }

        let mut last_err = TransportError::ConnectionFailed("no attempts made".into());
        for attempt in 1..=self.config.max_attempts {
            match self.try_connect().await {
                Ok(()) => {
                    log::info!("stream open (attempt {attempt})");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "connection attempt {attempt}/{} failed: {e}",
                        self.config.max_attempts
                    );
                    last_err = e;
                    if attempt < self.config.max_attempts {
                        let backoff = Duration::from_millis(self.config.backoff_ms * attempt as u64);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        let mut shared = self.shared.lock().await;
        shared.state = ConnectionState::Failed;
        shared.queue.clear();
        Err(last_err)
    }

    /// One connection attempt: dial, send setup, await the acknowledgement.
    async fn try_connect(&self) -> Result<(), TransportError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(TransportError::MissingApiKey)?;
        let url = endpoint_url(&self.config.host, api_key);

        let mut socket = self.connector.dial(&url).await?;
        socket
            .outbound
            .send(setup_message(&self.config.model, &self.config.system_prompt).to_string())
            .await
            .map_err(|_| TransportError::ConnectionFailed("socket closed during setup".into()))?;

        let wait = Duration::from_secs(self.config.connect_timeout_secs);
        let first = match timeout(wait, socket.inbound.recv()).await {
            Err(_) => return Err(TransportError::ConnectTimeout(self.config.connect_timeout_secs)),
            Ok(None) => {
                return Err(TransportError::ConnectionFailed(
                    "socket closed awaiting setup ack".into(),
                ))
            }
            Ok(Some(raw)) => ServerMessage::parse(&raw),
        };
        if first != ServerMessage::SetupComplete {
            return Err(TransportError::HandshakeRejected(format!("{first:?}")));
        }

        self.open(socket).await;
        Ok(())
    }

    /// Install the freshly acknowledged socket: flush queued frames in
    /// arrival order, mark the stream open, and start the reader task.
    async fn open(&self, socket: WireSocket) {
        let WireSocket { outbound, inbound } = socket;
        let generation = {
            let mut shared = self.shared.lock().await;
            for frame in shared.queue.drain() {
                if let Err(e) = outbound.try_send(audio_message(&frame).to_string()) {
                    log::warn!("dropped queued frame during flush: {e}");
                }
            }
            shared.outbound = Some(outbound);
            shared.state = ConnectionState::Open;
            shared.generation
        };
        self.spawn_reader(inbound, generation);
    }

    fn spawn_reader(&self, mut inbound: mpsc::Receiver<String>, generation: u64) {
        let transport = self.clone();
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                let message = ServerMessage::parse(&raw);
                if matches!(message, ServerMessage::Unknown) {
                    log::debug!("unrecognized server message: {raw}");
                }
                transport
                    .deliver(TransportEvent::Message(message), generation)
                    .await;
            }
            transport.handle_loss(generation).await;
        });
    }

    async fn deliver(&self, event: TransportEvent, generation: u64) {
        let sender = {
            let shared = self.shared.lock().await;
            if shared.generation != generation {
                return;
            }
            shared.events.clone()
        };
        if let Some(sender) = sender {
            if sender.send(event).await.is_err() {
                log::debug!("event subscriber dropped");
            }
        }
    }

    /// The socket ended without `close()`.  Attempt a fresh establishment
    /// cycle; if it also fails, surface a single [`TransportEvent::Lost`].
    async fn handle_loss(&self, generation: u64) {
        {
            let mut shared = self.shared.lock().await;
            if shared.generation != generation || shared.state != ConnectionState::Open {
                return; // closed deliberately, or superseded
            }
            shared.state = ConnectionState::Connecting;
            shared.outbound = None;
        }
        log::warn!("stream lost, reconnecting");
        if let Err(e) = self.establish().await {
            log::error!("reconnect failed: {e}");
            self.deliver(TransportEvent::Lost(e), generation).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
