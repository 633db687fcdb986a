//! Streaming connection to the inference service.
//!
//! The transport turns the raw WebSocket into a resilient, frame-oriented
//! stream:
//!
//! - [`protocol`] builds the JSON envelopes and parses server replies,
//! - [`queue`] buffers frames while the socket is down,
//! - [`connector`] is the dialing seam (mockable in tests),
//! - [`stream`] ties them together into the connection state machine.

pub mod connector;
pub mod protocol;
pub mod queue;
pub mod stream;

pub use connector::{WireConnector, WireSocket, WsConnector};
pub use protocol::{endpoint_url, ServerMessage};
pub use queue::FrameQueue;
pub use stream::{ConnectionState, StreamTransport, TransportError, TransportEvent};
