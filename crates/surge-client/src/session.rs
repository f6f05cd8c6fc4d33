//! Login-scoped session facade.
//!
//! A [`ChatSession`] wires a [`ConnectionManager`] to a
//! [`Reconciler`] and a [`TypingDebouncer`], exposing one API for
//! sending chat actions and reading the resulting room state. Every
//! inbound frame flows through the reconciler on the connection
//! actor's task; callers read snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use surge_core::{
    Identity, Notice, Reconciler, Room, TypingDebouncer, TypingSignal,
};
use surge_protocol::ClientEvent;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::ClientConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, LinkOptions};
use crate::error::ClientError;
use crate::state::LinkStatus;
use crate::transport::Transport;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running chat session for one logged-in user.
pub struct ChatSession {
    identity: Identity,
    handle: ConnectionHandle,
    reconciler: Arc<RwLock<Reconciler>>,
    debouncer: Arc<Mutex<TypingDebouncer>>,
    typing_timer: Mutex<Option<JoinHandle<()>>>,
    notices: Mutex<mpsc::UnboundedReceiver<Notice>>,
    idle_timeout: Duration,
}

impl ChatSession {
    /// Spawn the connection actor and wire the reconciler into its
    /// dispatch path.
    ///
    /// The session does not connect yet; call [`ChatSession::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionClosed`] if the actor stops
    /// before the session is wired up.
    pub async fn start<T: Transport>(
        identity: Identity,
        config: ClientConfig,
        transport: T,
    ) -> Result<Self, ClientError> {
        let options = LinkOptions {
            endpoint: config.endpoint.clone(),
            rooms: config.rooms.iter().map(|room| room.id.clone()).collect(),
            policy: config.reconnect_policy(),
            replay_history: config.history.replay,
            history_limit: config.history.limit,
        };
        let handle = ConnectionManager::spawn(transport, identity.as_user(), options);

        let reconciler = Arc::new(RwLock::new(Reconciler::new(
            identity.clone(),
            &config.room_catalog(),
        )));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let reconciler_in_handler = Arc::clone(&reconciler);
        handle
            .on_message(move |message| {
                let mut reconciler = reconciler_in_handler
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(notice) = reconciler.apply(message) {
                    let _ = notice_tx.send(notice);
                }
            })
            .await
            .ok_or(ClientError::ConnectionClosed)?;

        Ok(Self {
            identity,
            handle,
            reconciler,
            debouncer: Arc::new(Mutex::new(TypingDebouncer::with_timeout(
                config.typing_idle_timeout(),
            ))),
            typing_timer: Mutex::new(None),
            notices: Mutex::new(notice_rx),
            idle_timeout: config.typing_idle_timeout(),
        })
    }

    /// The identity this session is logged in as.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Request a connection. Reconnection after failures is automatic.
    pub fn connect(&self) {
        self.handle.connect();
    }

    /// Disconnect intentionally. No reconnect is attempted and any
    /// pending typing state is dropped without emitting.
    pub fn disconnect(&self) {
        self.cancel_typing_timer();
        lock(&self.debouncer).reset();
        self.handle.disconnect();
    }

    /// Current link status snapshot.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        self.handle.current_status()
    }

    /// Watch channel for link status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.handle.status()
    }

    /// Publish a chat message to a room.
    ///
    /// Also emits the typing `Stop` for the room, since submitting
    /// ends composition. Returns `false` when not connected; the
    /// message is dropped, not queued.
    pub async fn send_message(&self, room: &str, text: &str) -> bool {
        let delivered = self
            .handle
            .send(ClientEvent::publish(room, self.identity.as_user(), text))
            .await;

        self.cancel_typing_timer();
        let (stop_room, signal) = lock(&self.debouncer).submitted(room);
        self.send_typing(&stop_room, signal).await;

        delivered
    }

    /// Edit one of this user's messages.
    pub async fn edit_message(&self, room: &str, message_id: &str, new_text: &str) -> bool {
        self.handle
            .send(ClientEvent::edit_message(
                room,
                message_id,
                self.identity.as_user(),
                new_text,
            ))
            .await
    }

    /// Delete one of this user's messages.
    pub async fn delete_message(&self, room: &str, message_id: &str) -> bool {
        self.handle
            .send(ClientEvent::delete_message(
                room,
                message_id,
                self.identity.as_user(),
            ))
            .await
    }

    /// Send a direct message to another user.
    pub async fn send_direct_message(&self, to_user_id: &str, text: &str) -> bool {
        self.handle
            .send(ClientEvent::direct_msg(
                to_user_id,
                self.identity.as_user(),
                text,
            ))
            .await
    }

    /// Acknowledge that this user has read a message.
    pub async fn mark_read(&self, room: &str, message_id: &str) -> bool {
        self.handle
            .send(ClientEvent::read_receipt(
                room,
                message_id,
                self.identity.as_user(),
            ))
            .await
    }

    /// Feed a change of the composer text for a room.
    ///
    /// Emits typing `Start`/`Stop` transitions as needed and (re)arms
    /// the idle timer that stops the indicator after a quiet period.
    pub async fn input_changed(&self, room: &str, text: &str) {
        let (emissions, armed) = {
            let mut debouncer = lock(&self.debouncer);
            let emissions = debouncer.input_changed(room, text, Instant::now());
            (emissions, debouncer.deadline().is_some())
        };
        for (room, signal) in emissions {
            self.send_typing(&room, signal).await;
        }
        if armed {
            self.arm_typing_timer();
        } else {
            self.cancel_typing_timer();
        }
    }

    /// Switch the active room without any input.
    ///
    /// Stops a typing indicator left running in the previous room.
    pub async fn set_active_room(&self) {
        self.cancel_typing_timer();
        let emission = lock(&self.debouncer).switch_room();
        if let Some((room, signal)) = emission {
            self.send_typing(&room, signal).await;
        }
    }

    /// Snapshot of all rooms.
    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        self.reconciler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms()
            .to_vec()
    }

    /// Snapshot of a single room.
    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<Room> {
        self.reconciler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .room(room_id)
            .cloned()
    }

    /// Drain notices produced since the last call (direct messages,
    /// server errors).
    pub fn take_notices(&self) -> Vec<Notice> {
        let mut receiver = lock(&self.notices);
        let mut out = Vec::new();
        while let Ok(notice) = receiver.try_recv() {
            out.push(notice);
        }
        out
    }

    /// Stop the session and its connection actor.
    pub fn shutdown(&self) {
        self.cancel_typing_timer();
        self.handle.shutdown();
        debug!(user = %self.identity.username, "Session shut down");
    }

    async fn send_typing(&self, room: &str, signal: TypingSignal) {
        let is_typing = signal == TypingSignal::Start;
        let _ = self
            .handle
            .send(ClientEvent::typing(room, self.identity.as_user(), is_typing))
            .await;
    }

    fn arm_typing_timer(&self) {
        let mut slot = lock(&self.typing_timer);
        if let Some(task) = slot.take() {
            task.abort();
        }
        let debouncer = Arc::clone(&self.debouncer);
        let handle = self.handle.clone();
        let user = self.identity.as_user();
        let idle = self.idle_timeout;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let emission = lock(&debouncer).poll(Instant::now());
            if let Some((room, _)) = emission {
                let _ = handle.send(ClientEvent::typing(room, user, false)).await;
            }
        }));
    }

    fn cancel_typing_timer(&self) {
        if let Some(task) = lock(&self.typing_timer).take() {
            task.abort();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.cancel_typing_timer();
    }
}
