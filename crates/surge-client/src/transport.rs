//! Transport abstraction for the client connection.
//!
//! A [`Transport`] dials an endpoint and yields a split connection:
//! a [`FrameSink`] the connection manager writes outgoing frames to,
//! and a [`FrameStream`] a reader task drains. Frames are the wire's
//! unit of exchange, one UTF-8 JSON object each; the transport does
//! not interpret them.

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Dialing the endpoint failed.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Failed to send a frame.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The connection is closed.
    #[error("Connection closed")]
    Closed,
}

/// The write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// The read half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Receive the next text frame.
    ///
    /// Returns `None` once the connection is closed, cleanly or not;
    /// the distinction does not matter to the lifecycle machine.
    async fn next(&mut self) -> Option<String>;
}

/// A dialer for the chat endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to the endpoint.
    async fn dial(
        &self,
        url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError>;

    /// The transport name (e.g. "websocket", "memory").
    fn name(&self) -> &'static str;
}
