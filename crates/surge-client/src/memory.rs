//! In-memory transport for tests.
//!
//! A [`MemoryTransport`] dials into the paired [`MemoryHost`], which
//! plays the server: it accepts connections, reads the frames the
//! client sent, injects frames of its own, and can drop a connection
//! or refuse dials to exercise the reconnection machinery.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::transport::{FrameSink, FrameStream, Transport, TransportError};

/// Client-side in-memory transport. Cloneable; every dial produces a
/// fresh [`MemoryPeer`] on the host side.
#[derive(Clone)]
pub struct MemoryTransport {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    refuse_dials: Arc<AtomicU32>,
    dial_count: Arc<AtomicU32>,
}

/// Server side of the in-memory transport pair.
pub struct MemoryHost {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    refuse_dials: Arc<AtomicU32>,
    dial_count: Arc<AtomicU32>,
}

/// One accepted connection, seen from the server side.
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<String>>,
}

impl MemoryTransport {
    /// Create a connected transport/host pair.
    #[must_use]
    pub fn pair() -> (Self, MemoryHost) {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let refuse_dials = Arc::new(AtomicU32::new(0));
        let dial_count = Arc::new(AtomicU32::new(0));
        (
            Self {
                peers: peer_tx,
                refuse_dials: Arc::clone(&refuse_dials),
                dial_count: Arc::clone(&dial_count),
            },
            MemoryHost {
                peers: peer_rx,
                refuse_dials,
                dial_count,
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn dial(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>), TransportError> {
        self.dial_count.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .refuse_dials
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::ConnectFailed("dial refused".to_string()));
        }

        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, client_rx) = mpsc::unbounded_channel();

        self.peers
            .send(MemoryPeer {
                from_client,
                to_client: Some(to_client),
            })
            .map_err(|_| TransportError::ConnectFailed("host is gone".to_string()))?;

        Ok((
            Box::new(MemorySink { tx: client_tx }),
            Box::new(MemoryReader { rx: client_rx }),
        ))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl MemoryHost {
    /// Refuse the next `n` dials with a connect error.
    pub fn refuse_next_dials(&self, n: u32) {
        self.refuse_dials.store(n, Ordering::SeqCst);
    }

    /// Total number of dial attempts seen so far, refused ones included.
    #[must_use]
    pub fn dial_count(&self) -> u32 {
        self.dial_count.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }
}

impl MemoryPeer {
    /// Read the next frame the client sent.
    ///
    /// Returns `None` once the client side is closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Read the next frame without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Inject a frame toward the client.
    pub fn send(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(frame.into());
        }
    }

    /// Drop the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

struct MemorySink {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(frame)
            .map_err(|_| TransportError::SendFailed("peer is gone".to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MemoryReader {
    async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
