//! Transport seam between the session state machine and the socket.
//!
//! The [`ConnectionManager`](crate::client::ConnectionManager) only ever
//! talks to a [`Transport`]: it asks it to open, send text frames and close.
//! Everything the socket reports back comes in as a [`TransportEvent`].
//! Tests substitute a recording transport; production uses
//! [`WebSocketTransport`].
//!
//! ```text
//!   open(url) ──► connection task ──► tokio-tungstenite
//!                    │      ▲
//!   (gen, event) ◄───┘      └─── outgoing frames (mpsc)
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Signals surfaced by the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket is open.
    Connected,
    /// An inbound text frame.
    Message(String),
    /// An open socket went away.
    Disconnected(String),
    /// Opening the socket failed.
    ConnectError(String),
}

/// Transport failures when handing over a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not open")]
    NotOpen,
    #[error("Connection closed")]
    Closed,
}

/// A socket the session can drive without awaiting.
///
/// `open` starts a connection attempt whose outcome is reported later as a
/// [`TransportEvent`]; it must replace any previous socket.
pub trait Transport {
    fn open(&mut self, url: &str);
    fn send(&mut self, frame: String) -> Result<(), TransportError>;
    fn close(&mut self);
}

/// Events tagged with the connection attempt that produced them.
pub type TransportEvents = mpsc::UnboundedReceiver<(u64, TransportEvent)>;

/// WebSocket transport backed by `tokio-tungstenite`.
///
/// Each `open` bumps the generation; events of older attempts still arrive on
/// the channel and must be discarded by comparing against [`generation`].
/// Requires a running tokio runtime.
///
/// [`generation`]: WebSocketTransport::generation
pub struct WebSocketTransport {
    generation: u64,
    outgoing_tx: Option<mpsc::UnboundedSender<String>>,
    events_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl WebSocketTransport {
    /// Create the transport and the receiver its events are delivered on.
    pub fn new() -> (Self, TransportEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            generation: 0,
            outgoing_tx: None,
            events_tx,
        };
        (transport, events_rx)
    }

    /// Generation of the current connection attempt.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    async fn run_connection(
        url: String,
        generation: u64,
        mut outgoing_rx: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<(u64, TransportEvent)>,
    ) {
        let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                log::warn!("WebSocket connect to {url} failed: {e}");
                let _ = events.send((generation, TransportEvent::ConnectError(e.to_string())));
                return;
            }
        };

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let _ = events.send((generation, TransportEvent::Connected));

        let reason = loop {
            tokio::select! {
                outgoing = outgoing_rx.recv() => match outgoing {
                    Some(frame) => {
                        if let Err(e) = ws_writer.send(Message::Text(frame.into())).await {
                            break e.to_string();
                        }
                    }
                    None => {
                        // Closed locally; the session already knows.
                        let _ = ws_writer.close().await;
                        return;
                    }
                },
                incoming = ws_reader.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let message = TransportEvent::Message(text.as_str().to_owned());
                        let _ = events.send((generation, message));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "io server disconnect".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "transport close".to_string(),
                },
            }
        };

        log::debug!("WebSocket {url} closed: {reason}");
        let _ = events.send((generation, TransportEvent::Disconnected(reason)));
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, url: &str) {
        self.close();
        self.generation += 1;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        self.outgoing_tx = Some(outgoing_tx);

        tokio::spawn(Self::run_connection(
            url.to_string(),
            self.generation,
            outgoing_rx,
            self.events_tx.clone(),
        ));
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        match self.outgoing_tx {
            Some(ref tx) => tx.send(frame).map_err(|_| TransportError::Closed),
            None => Err(TransportError::NotOpen),
        }
    }

    fn close(&mut self) {
        // Dropping the sender ends the connection task.
        if self.outgoing_tx.take().is_some() {
            self.generation += 1;
        }
    }
}
