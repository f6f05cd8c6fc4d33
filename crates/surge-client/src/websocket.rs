//! WebSocket transport implementation.
//!
//! Dials with tokio-tungstenite and maps WebSocket frames onto the
//! text-frame contract of [`Transport`]. Binary, ping, and pong
//! frames are not part of the chat protocol and are skipped.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::transport::{FrameSink, FrameStream, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Create a WebSocket transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        debug!(%url, status = %response.status(), "WebSocket handshake completed");

        let (sink, stream) = stream.split();
        Ok((
            Box::new(WebSocketSink { sink }),
            Box::new(WebSocketReader { stream }),
        ))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(frame))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

struct WebSocketReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WebSocketReader {
    async fn next(&mut self) -> Option<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(text),
                Some(Ok(Message::Close(_))) => {
                    debug!("Received close frame");
                    return None;
                }
                // Not part of the chat protocol.
                Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket read error");
                    return None;
                }
                None => {
                    debug!("WebSocket stream ended");
                    return None;
                }
            }
        }
    }
}
