//! Turn-cycle orchestration.
//!
//! [`SessionController`] sits between the microphone and the transport and
//! drives one coaching session at a time: open the capture, stream frames
//! as they are encoded, signal end of turn, then hand the model's reply to
//! the subscriber as parsed [`Feedback`] — exactly once per session.  The
//! session closes with the feedback; the next `start()` opens a fresh one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crate::audio::{AudioFrame, CaptureHandle, CaptureSource, FrameEncoder};
use crate::config::AudioConfig;
use crate::transport::{ServerMessage, StreamTransport, TransportError, TransportEvent};

use super::feedback::Feedback;
use super::state::{Session, SessionError, SessionState};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a session subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The model's feedback; delivered once, then the session is closed.
    Feedback(Feedback),
    /// The stream failed mid-session.  The session is closed; a new
    /// `start()` may be issued immediately.
    Aborted(TransportError),
}

/// Text sent with `turn_complete` after the audio; nudges the model to
/// produce the labeled feedback sections now.
const TURN_PROMPT: &str = "That was my attempt. Please give your feedback now.";

/// Capacity of the subscriber event channel.
const EVENT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

struct Inner {
    /// Current (or most recently closed) session.
    session: Option<Session>,
    /// Set while `start()` is connecting, before a session exists; keeps
    /// re-entrant `start()` rejected without holding the lock across the
    /// connect.
    starting: bool,
    /// Fires to end the running capture pump early.
    stop_tx: Option<oneshot::Sender<()>>,
    /// Current subscriber, last `subscribe()` wins.
    events: Option<mpsc::Sender<SessionEvent>>,
    router_started: bool,
}

/// Orchestrates capture, streaming, and feedback delivery.
///
/// Cheap to clone; clones share state.  Typical use:
///
/// ```no_run
/// # async fn demo() -> Result<(), talkcoach::session::SessionError> {
/// # use std::sync::Arc;
/// # use talkcoach::audio::MicCapture;
/// # use talkcoach::config::AppConfig;
/// # use talkcoach::session::{SessionController, SessionEvent};
/// # use talkcoach::transport::{StreamTransport, WsConnector};
/// let config = AppConfig::default();
/// let transport = StreamTransport::new(config.transport.clone(), Arc::new(WsConnector::new()));
/// let coach = SessionController::new(transport, Arc::new(MicCapture::new()), config.audio);
///
/// let mut events = coach.subscribe().await;
/// let session_id = coach.start().await?;
/// // ... the learner speaks ...
/// coach.stop().await?;
/// if let Some(SessionEvent::Feedback(feedback)) = events.recv().await {
///     println!("grammar: {}", feedback.grammar);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionController {
    transport: StreamTransport,
    capture: Arc<dyn CaptureSource>,
    max_recording: Duration,
    shared: Arc<Mutex<Inner>>,
}

impl SessionController {
    pub fn new(
        transport: StreamTransport,
        capture: Arc<dyn CaptureSource>,
        audio: AudioConfig,
    ) -> Self {
        Self {
            transport,
            capture,
            max_recording: Duration::from_secs_f32(audio.max_recording_secs),
            shared: Arc::new(Mutex::new(Inner {
                session: None,
                starting: false,
                stop_tx: None,
                events: None,
                router_started: false,
            })),
        }
    }

    /// State of the current session, or [`SessionState::Idle`] when none
    /// has been started yet.
    pub async fn state(&self) -> SessionState {
        let inner = self.shared.lock().await;
        inner
            .session
            .as_ref()
            .map(|s| s.state)
            .unwrap_or(SessionState::Idle)
    }

    /// Snapshot of the current session record.
    pub async fn session(&self) -> Option<Session> {
        self.shared.lock().await.session.clone()
    }

    /// Replace the event subscriber.  The previous subscriber's channel is
    /// closed; only the most recent receiver sees subsequent events.
    pub async fn subscribe(&self) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CAPACITY);
        self.shared.lock().await.events = Some(tx);
        rx
    }

    /// Begin a new session: open the microphone, establish the stream if
    /// needed, and start pumping frames.  Returns the session id.
    ///
    /// # Errors
    ///
    /// - [`SessionError::AlreadyActive`] while a session is capturing or
    ///   awaiting its response.
    /// - [`SessionError::Capture`] when the device cannot be opened.
    /// - [`SessionError::Transport`] when the stream cannot be established;
    ///   the microphone is released again on this path.
    pub async fn start(&self) -> Result<Uuid, SessionError> {
        {
            let mut inner = self.shared.lock().await;
            if inner.starting || inner.session.as_ref().is_some_and(Session::is_active) {
                return Err(SessionError::AlreadyActive);
            }
            inner.starting = true;

            if !inner.router_started {
                inner.router_started = true;
                let transport_events = self.transport.subscribe().await;
                self.spawn_router(transport_events);
            }
        }

        // Connect without holding the lock, so stop(), state() and the
        // router stay responsive through a slow establishment.  Microphone
        // first; handle drop releases it if the connect fails.
        let connected = async {
            let handle = self.capture.open()?;
            self.transport.connect().await?;
            Ok::<_, SessionError>(handle)
        }
        .await;

        let mut inner = self.shared.lock().await;
        inner.starting = false;
        let handle = connected?;

        let session = Session::new();
        let id = session.id;
        let (stop_tx, stop_rx) = oneshot::channel();
        inner.session = Some(session);
        inner.stop_tx = Some(stop_tx);
        drop(inner);

        log::info!("session {id} started");
        self.spawn_pump(id, handle, stop_rx);
        Ok(id)
    }

    /// End the capture and request feedback for the turn.  Resolution is
    /// asynchronous: the feedback (or an abort) arrives on the event
    /// channel.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoActiveSession`] unless a session is capturing.
    pub async fn stop(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.lock().await;
        match inner.session.as_mut() {
            Some(session) if session.state == SessionState::Capturing => {
                // Out of Capturing first: blocks still in flight from the
                // audio thread are discarded, not encoded.
                session.state = SessionState::AwaitingResponse;
                if let Some(stop) = inner.stop_tx.take() {
                    let _ = stop.send(());
                }
                Ok(())
            }
            _ => Err(SessionError::NoActiveSession),
        }
    }

    /// Shut down: abort any active session and close the stream.  A later
    /// `start()` reconnects from scratch.
    pub async fn close(&self) {
        {
            let mut inner = self.shared.lock().await;
            if let Some(stop) = inner.stop_tx.take() {
                let _ = stop.send(());
            }
            if let Some(session) = inner.session.as_mut() {
                session.state = SessionState::Closed;
            }
            inner.events = None;
        }
        self.transport.close().await;
        log::info!("controller closed");
    }

    // -- background tasks ----------------------------------------------------

    fn spawn_pump(
        &self,
        session_id: Uuid,
        mut handle: CaptureHandle,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let controller = self.clone();
        let limit = controller.max_recording;
        tokio::spawn(async move {
            let mut encoder = FrameEncoder::new();
            let deadline = tokio::time::sleep(limit);
            tokio::pin!(deadline);
            // Set when the device itself ended the stream; only then is the
            // sub-frame tail worth flushing — on an explicit stop the tail
            // is discarded along with any in-flight blocks.
            let mut source_ended = false;

            loop {
                tokio::select! {
                    // Stop and the limit take priority over buffered blocks:
                    // once the turn ends, in-flight audio is discarded.
                    biased;
                    _ = &mut deadline => {
                        log::info!("recording length limit reached");
                        break;
                    }
                    _ = &mut stop_rx => break,
                    block = handle.next_block() => match block {
                        Some(samples) => {
                            for frame in encoder.push(&samples) {
                                controller.transport.send_frame(frame).await;
                            }
                        }
                        None => {
                            source_ended = true;
                            break;
                        }
                    },
                }
            }

            handle.close();
            let tail = if source_ended { encoder.flush() } else { None };
            controller.finish_turn(session_id, tail).await;
        });
    }

    /// Move the pump's own session to AwaitingResponse (unless `stop()`
    /// already did) and ask the model to respond.  A pump whose session
    /// was replaced while it wound down must not touch the new one.
    async fn finish_turn(&self, session_id: Uuid, tail: Option<AudioFrame>) {
        {
            let mut inner = self.shared.lock().await;
            match inner.session.as_mut() {
                Some(session) if session.id != session_id => return,
                Some(session) if session.state == SessionState::Capturing => {
                    session.state = SessionState::AwaitingResponse;
                    inner.stop_tx = None;
                }
                Some(session) if session.state == SessionState::AwaitingResponse => {}
                _ => return, // aborted or shut down while the pump wound down
            }
        }
        if let Some(frame) = tail {
            self.transport.send_frame(frame).await;
        }
        log::info!("turn complete, awaiting feedback");
        if let Err(e) = self.transport.send_turn(TURN_PROMPT).await {
            self.abort(e).await;
        }
    }

    fn spawn_router(&self, mut transport_events: mpsc::Receiver<TransportEvent>) {
        let controller = self.clone();
        tokio::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                match event {
                    TransportEvent::Message(ServerMessage::ModelText(text)) => {
                        controller.on_model_text(text).await;
                    }
                    TransportEvent::Message(_) => {}
                    TransportEvent::Lost(e) => controller.abort(e).await,
                }
            }
        });
    }

    async fn on_model_text(&self, text: String) {
        let sender = {
            let mut inner = self.shared.lock().await;
            match inner.session.as_mut() {
                Some(session) if session.state == SessionState::AwaitingResponse => {
                    session.state = SessionState::Closed;
                    inner.events.clone()
                }
                _ => {
                    log::debug!("ignoring model text outside a pending turn: {text}");
                    return;
                }
            }
        };
        log::info!("feedback received, session closed");
        let feedback = Feedback::parse(&text);
        if let Some(sender) = sender {
            if sender.send(SessionEvent::Feedback(feedback)).await.is_err() {
                log::debug!("feedback dropped, subscriber gone");
            }
        }
    }

    /// Close the active session with an error and notify the subscriber
    /// once.  No-op when no session is active.
    async fn abort(&self, error: TransportError) {
        let sender = {
            let mut inner = self.shared.lock().await;
            let Some(session) = inner.session.as_mut() else {
                return;
            };
            if !session.is_active() {
                return;
            }
            session.state = SessionState::Closed;
            if let Some(stop) = inner.stop_tx.take() {
                let _ = stop.send(());
            }
            inner.events.clone()
        };
        log::warn!("session aborted: {error}");
        if let Some(sender) = sender {
            let _ = sender.send(SessionEvent::Aborted(error)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
