//! Session orchestration: the turn cycle from microphone to feedback.

pub mod controller;
pub mod feedback;
pub mod state;

pub use controller::{SessionController, SessionEvent};
pub use feedback::Feedback;
pub use state::{Session, SessionError, SessionState};
