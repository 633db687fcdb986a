//! Realtime spoken-English coaching over a streaming inference service.
//!
//! The crate captures microphone audio, streams it as 16 kHz PCM frames
//! over a bidirectional WebSocket to a generative model, and turns the
//! model's reply into structured coaching feedback (what it heard, grammar,
//! pronunciation, suggestions, and a next practice prompt).  Optionally the
//! feedback is spoken back via a text-to-speech service.
//!
//! # Pipeline
//!
//! ```text
//! microphone ──> capture ──> encoder ──> transport ──> inference service
//!   (cpal)      (f32 blocks) (i16 frames) (WebSocket)        │
//!                                                            v
//! subscriber <── session controller <── feedback parser <── model text
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use talkcoach::audio::MicCapture;
//! use talkcoach::config::AppConfig;
//! use talkcoach::session::{SessionController, SessionEvent};
//! use talkcoach::transport::{StreamTransport, WsConnector};
//!
//! let config = AppConfig::load()?;
//! let transport = StreamTransport::new(config.transport.clone(), Arc::new(WsConnector::new()));
//! let session = SessionController::new(transport, Arc::new(MicCapture::new()), config.audio);
//!
//! let mut events = session.subscribe().await;
//!
//! let session_id = session.start().await?;
//! println!("session {session_id}: speak now");
//! // ... the learner speaks ...
//! session.stop().await?;
//!
//! if let Some(SessionEvent::Feedback(feedback)) = events.recv().await {
//!     println!("{}", feedback.suggestions);
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod session;
pub mod transport;
pub mod tts;
