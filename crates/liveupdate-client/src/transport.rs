//! Duplex channel seam.
//!
//! The socket implementation is deliberately opaque to the engine: all it
//! sees is a pair of send/receive halves carrying text frames plus
//! close/error events. [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`; tests inject in-memory channels through the same
//! [`Connector`] trait.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event surfaced by the receive half of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An inbound text frame.
    Message(String),
    /// The channel closed; `code` is the close code when one was provided.
    /// A close is authoritative for the connection state.
    Closed {
        /// Numeric close code, if the peer sent one.
        code: Option<u16>,
    },
    /// A channel-level error. Carries only diagnostic text and no state
    /// change of its own; the subsequent close decides the state.
    Error(String),
}

/// Send half of a duplex channel.
#[async_trait]
pub trait ChannelTx: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
}

/// Receive half of a duplex channel.
#[async_trait]
pub trait ChannelRx: Send {
    /// Next channel event; `None` once the stream has ended.
    async fn recv(&mut self) -> Option<ChannelEvent>;
}

/// Opens a fresh duplex channel on demand.
///
/// Each `reconnect()` of the client asks its connector for a new channel;
/// the connector itself never retries on a timer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a channel to the live update endpoint.
    async fn connect(&self) -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), TransportError>;
}

/// Production connector over `tokio-tungstenite`.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for the given WebSocket URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The endpoint URL this connector dials.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<(Box<dyn ChannelTx>, Box<dyn ChannelRx>), TransportError> {
        let (ws, _) = connect_async(&self.url)
            .await
            .map_err(|e| TransportError::Connect {
                context: e.to_string(),
            })?;
        let (tx, rx) = ws.split();
        Ok((Box::new(WsTx { tx }), Box::new(WsRx { rx })))
    }
}

struct WsTx {
    tx: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ChannelTx for WsTx {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send {
                context: e.to_string(),
            })
    }
}

struct WsRx {
    rx: SplitStream<WsStream>,
}

#[async_trait]
impl ChannelRx for WsRx {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            let msg = self.rx.next().await?;
            match msg {
                Ok(Message::Text(text)) => return Some(ChannelEvent::Message(text.to_string())),
                Ok(Message::Binary(data)) => {
                    // Tolerate text sent as binary; drop anything else.
                    if let Ok(text) = std::str::from_utf8(&data) {
                        return Some(ChannelEvent::Message(text.to_string()));
                    }
                    debug!(len = data.len(), "dropping non-UTF8 binary frame");
                }
                Ok(Message::Close(frame)) => {
                    return Some(ChannelEvent::Closed {
                        code: frame.map(|f| u16::from(f.code)),
                    });
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(ChannelEvent::Error(e.to_string())),
            }
        }
    }
}
