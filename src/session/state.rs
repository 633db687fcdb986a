//! Session records, lifecycle states and errors.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::audio::AudioError;
use crate::transport::TransportError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its capture-to-response cycle.
///
/// ```text
///          start()                  stop()
///   Idle ----------> Capturing --------------> AwaitingResponse
///                        |                            |
///                        | abort                      | feedback / abort
///                        v                            v
///                      Closed <-----------------------+
/// ```
///
/// `Closed` is terminal for the session; the controller starts a fresh
/// session for the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session in flight.
    Idle,
    /// Microphone open, frames streaming to the service.
    Capturing,
    /// Turn finished, waiting for the model's feedback.
    AwaitingResponse,
    /// Feedback delivered or the session aborted.
    Closed,
}

impl SessionState {
    /// Human-readable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::AwaitingResponse => "awaiting-response",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One capture-to-response cycle.  Created when recording starts; closed
/// when feedback arrives or the session aborts.  At most one session is
/// active at a time.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session, already capturing.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Capturing,
            created_at: Utc::now(),
        }
    }

    /// `true` while the session occupies the microphone or awaits a reply.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionState::Capturing | SessionState::AwaitingResponse
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A session is already capturing or awaiting a response.
    #[error("a session is already active")]
    AlreadyActive,

    /// `stop()` was called with no capture running.
    #[error("no active session")]
    NoActiveSession,

    #[error("capture error: {0}")]
    Capture(#[from] AudioError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_are_capturing_with_unique_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_eq!(a.state, SessionState::Capturing);
        assert!(a.is_active());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn closed_sessions_are_inactive() {
        let mut session = Session::new();
        session.state = SessionState::AwaitingResponse;
        assert!(session.is_active());
        session.state = SessionState::Closed;
        assert!(!session.is_active());
    }

    #[test]
    fn state_names_for_logs() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::AwaitingResponse.to_string(), "awaiting-response");
    }
}
