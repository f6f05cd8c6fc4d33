//! # surge-core
//!
//! Room model, reconciliation, and event dispatch for the Surge
//! realtime chat sync engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** / **ChatMessage** - The authoritative in-memory room model
//! - **Reconciler** - Applies inbound protocol events as state transitions
//! - **Dispatcher** - Fans inbound messages out to registered consumers
//! - **TypingDebouncer** - Derives typing start/stop from raw input changes
//! - **Identity** - The login-scoped local user
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐
//! │ Transport │────▶│ Dispatcher │────▶│ Reconciler │
//! └───────────┘     └────────────┘     └────────────┘
//!                                            │
//!                                            ▼
//!                                      ┌────────────┐
//!                                      │   Rooms    │
//!                                      └────────────┘
//! ```
//!
//! All of this crate is synchronous and deterministic; timers and the
//! transport live in `surge-client`.

pub mod dispatcher;
pub mod identity;
pub mod message;
pub mod reconciler;
pub mod room;
pub mod typing;

pub use dispatcher::{Dispatcher, HandlerId};
pub use identity::Identity;
pub use message::{ChatMessage, MessageKind};
pub use reconciler::{Notice, Reconciler};
pub use room::{Room, RoomCatalog};
pub use typing::{TypingDebouncer, TypingSignal};
