//! The login-scoped local user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use surge_protocol::User;

/// Counter folded into generated ids so two logins within the same
/// nanosecond still get distinct ids.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a fresh client-side user id.
#[must_use]
pub fn generate_user_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("user-{:x}", timestamp.wrapping_add(counter))
}

/// The local user's identity for the lifetime of a login session.
///
/// `user_id` is generated at login and is the key every ownership,
/// presence, and typing comparison uses; `username` is display-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Client-generated identity key.
    pub user_id: String,
    /// Display name entered at login.
    pub username: String,
}

impl Identity {
    /// Create an identity with a freshly generated user id.
    #[must_use]
    pub fn login(username: impl Into<String>) -> Self {
        Self {
            user_id: generate_user_id(),
            username: username.into(),
        }
    }

    /// Create an identity from an existing `(id, name)` pair.
    #[must_use]
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }

    /// The wire representation of this identity.
    #[must_use]
    pub fn as_user(&self) -> User {
        User::new(self.user_id.clone(), self.username.clone())
    }

    /// Whether a wire user is this local user.
    #[must_use]
    pub fn is_self(&self, user: &User) -> bool {
        user.id == self.user_id
    }
}
