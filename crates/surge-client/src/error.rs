//! Client-side error types.

use surge_protocol::ProtocolError;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the client to callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection actor has shut down and can no longer be reached.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
