//! # Surge CLI
//!
//! Line-based terminal client for a Surge chat server.
//!
//! ## Usage
//!
//! ```bash
//! # Connect as the last-used (or prompted) username
//! surge
//!
//! # Connect as a specific username
//! surge alice
//!
//! # Point at a different server
//! SURGE_ENDPOINT=wss://chat.example.com/ws surge
//! ```

mod repl;

use anyhow::Result;
use surge_client::{ChatSession, ClientConfig, WebSocketTransport};
use surge_core::Identity;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "surge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = ClientConfig::load()?;

    let username = match std::env::args().nth(1) {
        Some(name) => name,
        None => repl::resolve_username()?,
    };
    repl::remember_username(&username);

    tracing::info!(endpoint = %config.endpoint, %username, "Starting Surge client");

    let session = ChatSession::start(
        Identity::login(username.as_str()),
        config.clone(),
        WebSocketTransport::new(),
    )
    .await?;
    session.connect();

    repl::run(session, &config).await?;

    Ok(())
}
