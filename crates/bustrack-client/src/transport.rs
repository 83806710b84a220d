//! The seam between the connection manager and the socket.
//!
//! [`Transport`] opens [`Channel`]s; the production implementation speaks
//! WebSocket through `tokio-tungstenite`. Tests substitute scripted
//! channels so reconnection can be driven without a network.

use async_trait::async_trait;
use bustrack_core::CloseInfo;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something that happened on an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// An inbound text frame.
    Text(String),
    /// The channel closed. No further events follow.
    Closed(CloseInfo),
}

/// One open, bidirectional channel.
#[async_trait]
pub trait Channel: Send {
    /// Wait for the next inbound event.
    ///
    /// An `Err` reports a transport error without closing the channel;
    /// closure is always reported as [`ChannelEvent::Closed`]. Must be
    /// cancel-safe.
    async fn next_event(&mut self) -> Result<ChannelEvent, TransportError>;

    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Start a clean close.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens channels to an address.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a channel to `address`.
    async fn open(&self, address: &str) -> Result<Box<dyn Channel>, TransportError>;
}

/// WebSocket transport over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, address: &str) -> Result<Box<dyn Channel>, TransportError> {
        let (stream, _response) =
            connect_async(address)
                .await
                .map_err(|e| TransportError::Connect {
                    address: address.to_owned(),
                    reason: e.to_string(),
                })?;
        Ok(Box::new(WebSocketChannel {
            stream,
            faulted: false,
        }))
    }
}

struct WebSocketChannel {
    stream: WsStream,
    faulted: bool,
}

#[async_trait]
impl Channel for WebSocketChannel {
    async fn next_event(&mut self) -> Result<ChannelEvent, TransportError> {
        // tungstenite does not recover from a read error; report the close
        // on the call after the error.
        if self.faulted {
            return Ok(ChannelEvent::Closed(CloseInfo::abnormal(
                "connection lost after error",
            )));
        }
        loop {
            match self.stream.next().await {
                None => {
                    return Ok(ChannelEvent::Closed(CloseInfo::abnormal("stream ended")));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(ChannelEvent::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(ChannelEvent::Text(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    ));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map_or(
                        CloseInfo {
                            code: None,
                            reason: String::new(),
                        },
                        |frame| CloseInfo {
                            code: Some(u16::from(frame.code)),
                            reason: frame.reason.as_str().to_owned(),
                        },
                    );
                    return Ok(ChannelEvent::Closed(info));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    self.faulted = true;
                    return Err(TransportError::Protocol(e.to_string()));
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => {
                debug!("close on an already-closed channel");
                Err(TransportError::Closed)
            }
            Err(e) => Err(TransportError::Protocol(e.to_string())),
        }
    }
}
