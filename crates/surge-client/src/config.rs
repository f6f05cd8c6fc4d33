//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (SURGE_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use surge_core::RoomCatalog;

use crate::state::ReconnectPolicy;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint to connect to.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Reconnection behaviour.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// History replay behaviour.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Typing indicator behaviour.
    #[serde(default)]
    pub typing: TypingConfig,

    /// Rooms joined on connect.
    #[serde(default = "default_rooms")]
    pub rooms: Vec<RoomEntry>,
}

/// Reconnection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Base backoff delay in milliseconds. The n-th attempt waits
    /// `base_delay_ms * n`.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Number of consecutive failed attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// History replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Request a history replay when subscribing.
    #[serde(default = "default_true")]
    pub replay: bool,

    /// Maximum number of messages to replay per room.
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

/// Typing indicator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Idle time in milliseconds after which a typing indicator stops.
    #[serde(default = "default_typing_idle")]
    pub idle_ms: u64,
}

/// A room in the configured catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEntry {
    /// Room identifier used on the wire.
    pub id: String,

    /// Display name.
    pub name: String,
}

// Default value functions
fn default_endpoint() -> String {
    std::env::var("SURGE_ENDPOINT").unwrap_or_else(|_| "ws://localhost:8080/ws".to_string())
}

fn default_base_delay() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

fn default_history_limit() -> u32 {
    50
}

fn default_typing_idle() -> u64 {
    3_000
}

fn default_rooms() -> Vec<RoomEntry> {
    vec![
        RoomEntry {
            id: "general".to_string(),
            name: "General".to_string(),
        },
        RoomEntry {
            id: "games".to_string(),
            name: "Games".to_string(),
        },
        RoomEntry {
            id: "tech".to_string(),
            name: "Tech".to_string(),
        },
    ]
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            reconnect: ReconnectConfig::default(),
            history: HistoryConfig::default(),
            typing: TypingConfig::default(),
            rooms: default_rooms(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            replay: true,
            limit: default_history_limit(),
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            idle_ms: default_typing_idle(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        // Try to load from default paths
        let config_paths = [
            "surge.toml",
            "/etc/surge/surge.toml",
            "~/.config/surge/surge.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ClientConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reconnect policy derived from the configured delays.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        }
    }

    /// Room catalog in the core's representation.
    #[must_use]
    pub fn room_catalog(&self) -> Vec<RoomCatalog> {
        self.rooms
            .iter()
            .map(|room| RoomCatalog::new(room.id.clone(), room.name.clone()))
            .collect()
    }

    /// Typing idle timeout as a [`Duration`].
    #[must_use]
    pub fn typing_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.typing.idle_ms)
    }
}
