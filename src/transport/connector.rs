//! Socket dialing seam.
//!
//! [`WireConnector`] abstracts "open a bidirectional text-message socket" so
//! the transport state machine can be unit-tested with in-memory channels.
//! [`WsConnector`] is the production implementation on tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::stream::TransportError;

// ---------------------------------------------------------------------------
// WireSocket
// ---------------------------------------------------------------------------

/// A live socket reduced to two text-message channels.
///
/// Dropping `outbound` closes the write side; `inbound` yielding `None`
/// means the peer (or the underlying socket) has gone away.  Both directions
/// preserve message order.
pub struct WireSocket {
    /// Client → server messages.
    pub outbound: mpsc::Sender<String>,
    /// Server → client messages.
    pub inbound: mpsc::Receiver<String>,
}

// ---------------------------------------------------------------------------
// WireConnector trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe socket dialer.
///
/// The transport holds an `Arc<dyn WireConnector>`; tests inject mock
/// connectors that hand back channel pairs without touching the network.
#[async_trait]
pub trait WireConnector: Send + Sync {
    /// Open a socket to `url`.
    ///
    /// # Errors
    ///
    /// [`TransportError::ConnectionFailed`] when the socket cannot be
    /// established.
    async fn dial(&self, url: &str) -> Result<WireSocket, TransportError>;
}

// Compile-time assertion: Box<dyn WireConnector> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn WireConnector>) {}
};

// ---------------------------------------------------------------------------
// WsConnector
// ---------------------------------------------------------------------------

/// Channel capacity for each pump direction.  Outbound is sized for a burst
/// of audio frames; inbound replies are few and small.
const OUTBOUND_CAPACITY: usize = 256;
const INBOUND_CAPACITY: usize = 64;

/// Production [`WireConnector`] backed by a WebSocket connection.
///
/// `dial` splits the socket and spawns one pump task per direction.  The
/// tasks end when their channel or the socket closes, which in turn closes
/// the other half — loss is always observable as `inbound` ending.
#[derive(Debug, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WireConnector for WsConnector {
    async fn dial(&self, url: &str) -> Result<WireSocket, TransportError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<String>(INBOUND_CAPACITY);

        // Writer pump: channel → socket.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    log::debug!("socket write ended: {e}");
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        // Reader pump: socket → channel.  Binary payloads are forwarded as
        // UTF-8 text when possible; the service sends JSON either way.
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                let forward = match msg {
                    Ok(Message::Text(text)) => Some(text),
                    Ok(Message::Binary(bytes)) => String::from_utf8(bytes).ok(),
                    Ok(Message::Close(frame)) => {
                        log::debug!("socket closed by peer: {frame:?}");
                        break;
                    }
                    Ok(_) => None, // ping/pong/frame — handled by tungstenite
                    Err(e) => {
                        log::debug!("socket read ended: {e}");
                        break;
                    }
                };
                if let Some(text) = forward {
                    if in_tx.send(text).await.is_err() {
                        break; // receiver side was dropped
                    }
                }
            }
            // in_tx drops here; the transport observes inbound closing.
        });

        Ok(WireSocket {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// A trivial connector echoing every message back, used to verify the
    /// trait contract that tests elsewhere rely on.
    struct EchoConnector;

    #[async_trait]
    impl WireConnector for EchoConnector {
        async fn dial(&self, _url: &str) -> Result<WireSocket, TransportError> {
            let (out_tx, mut out_rx) = mpsc::channel(8);
            let (in_tx, in_rx) = mpsc::channel(8);
            tokio::spawn(async move {
                while let Some(msg) = out_rx.recv().await {
                    if in_tx.send(msg).await.is_err() {
                        break;
                    }
                }
            });
            Ok(WireSocket {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }

    #[tokio::test]
    async fn wire_socket_preserves_order() {
        let mut socket = EchoConnector.dial("wss://unused").await.unwrap();
        socket.outbound.send("one".into()).await.unwrap();
        socket.outbound.send("two".into()).await.unwrap();

        assert_eq!(socket.inbound.recv().await.as_deref(), Some("one"));
        assert_eq!(socket.inbound.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn dropping_outbound_closes_inbound() {
        let mut socket = EchoConnector.dial("wss://unused").await.unwrap();
        drop(socket.outbound);
        assert_eq!(socket.inbound.recv().await, None);
    }

    #[test]
    fn ws_connector_is_a_trait_object() {
        let connector: Box<dyn WireConnector> = Box::new(WsConnector::new());
        drop(connector);
    }
}
