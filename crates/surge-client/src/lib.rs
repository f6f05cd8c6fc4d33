//! # surge-client
//!
//! Connection management and session wiring for the Surge realtime
//! chat sync engine.
//!
//! This crate owns everything that touches time or the network:
//!
//! - **Transport** - Abstraction over the frame-based connection,
//!   with a WebSocket implementation and an in-memory one for tests
//! - **LinkStateMachine** - The pure connection lifecycle state
//!   machine (disconnected / connecting / connected / reconnecting /
//!   failed) with linear-backoff reconnection
//! - **ConnectionManager** - The async driver: one task owning the
//!   live connection, the retry timer, and inbound dispatch
//! - **ChatSession** - Login-scoped wiring of connection, room
//!   reconciliation, and typing debounce behind a single facade
//!
//! ## Example
//!
//! ```rust,no_run
//! use surge_client::{ChatSession, ClientConfig, WebSocketTransport};
//! use surge_core::Identity;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ClientConfig::load()?;
//! let session = ChatSession::start(
//!     Identity::login("alice"),
//!     config,
//!     WebSocketTransport::new(),
//! )
//! .await?;
//!
//! session.connect();
//! session.send_message("general", "hello!").await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod memory;
pub mod session;
pub mod state;
pub mod transport;
pub mod websocket;

pub use config::ClientConfig;
pub use connection::{ConnectionHandle, ConnectionManager, LinkOptions};
pub use error::ClientError;
pub use memory::{MemoryHost, MemoryTransport};
pub use session::ChatSession;
pub use state::{ConnectionState, LinkStatus, ReconnectPolicy};
pub use transport::{FrameSink, FrameStream, Transport, TransportError};
pub use websocket::WebSocketTransport;
