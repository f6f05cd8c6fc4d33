//! Connection lifecycle actor.
//!
//! A [`ConnectionManager`] owns the live transport, the reconnect state
//! machine and the inbound message dispatcher, and runs as a single
//! tokio task. Callers interact with it through a cheap, cloneable
//! [`ConnectionHandle`] that sends commands over a channel and observes
//! the link through a watch channel.
//!
//! Each successful dial bumps a generation counter; frames and close
//! notifications from a previous transport carry the old generation and
//! are discarded, so a slow reader task can never corrupt the state of
//! a newer connection.

use std::collections::VecDeque;

use surge_core::{Dispatcher, HandlerId};
use surge_protocol::{self as protocol, ClientEvent, ServerMessage, User};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::state::{
    ConnectionState, LinkAction, LinkEvent, LinkStateMachine, LinkStatus, ReconnectPolicy,
};
use crate::transport::{FrameSink, FrameStream, Transport};

/// Everything the actor needs to open and re-open a link.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    /// Server endpoint passed to [`Transport::dial`].
    pub endpoint: String,
    /// Room ids to subscribe to on every (re)connect.
    pub rooms: Vec<String>,
    /// Reconnect backoff policy.
    pub policy: ReconnectPolicy,
    /// Whether subscriptions request a history replay.
    pub replay_history: bool,
    /// Maximum number of history messages requested per room.
    pub history_limit: u32,
}

/// Commands accepted by the connection actor.
enum Command {
    Connect,
    Disconnect,
    Send {
        event: ClientEvent,
        reply: oneshot::Sender<bool>,
    },
    Register {
        handler: Box<dyn FnMut(&ServerMessage) + Send>,
        reply: oneshot::Sender<HandlerId>,
    },
    Unregister(HandlerId),
    Shutdown,
}

/// Notifications from a reader task back into the actor.
enum TransportEvent {
    Frame { generation: u64, frame: String },
    Closed { generation: u64 },
}

enum Step {
    Command(Option<Command>),
    Transport(Option<TransportEvent>),
    RetryElapsed,
}

/// Handle to a running [`ConnectionManager`] task.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<LinkStatus>,
}

impl ConnectionHandle {
    /// Request a connection attempt. Idempotent while already
    /// connecting or connected.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Request an intentional disconnect. Cancels any pending retry and
    /// suppresses automatic reconnection for the resulting close.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Encode and send an event over the live link.
    ///
    /// Returns `false` when the link is not currently connected or the
    /// write fails; the event is dropped, never queued.
    pub async fn send(&self, event: ClientEvent) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Send { event, reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Register a handler for every inbound [`ServerMessage`].
    ///
    /// Handlers run in registration order on the actor task. Returns
    /// `None` when the actor has already shut down.
    pub async fn on_message(
        &self,
        handler: impl FnMut(&ServerMessage) + Send + 'static,
    ) -> Option<HandlerId> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Register {
                handler: Box::new(handler),
                reply,
            })
            .ok()?;
        rx.await.ok()
    }

    /// Remove a previously registered handler.
    pub fn off_message(&self, id: HandlerId) {
        let _ = self.commands.send(Command::Unregister(id));
    }

    /// Watch channel carrying the current link status.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Snapshot of the current link status.
    #[must_use]
    pub fn current_status(&self) -> LinkStatus {
        *self.status.borrow()
    }

    /// Stop the actor task, closing the transport if one is open.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// The connection actor. Created with [`ConnectionManager::spawn`],
/// which hands back a [`ConnectionHandle`] and runs the actor until
/// shutdown.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    options: LinkOptions,
    user: User,
    machine: LinkStateMachine,
    sink: Option<Box<dyn FrameSink>>,
    generation: u64,
    retry_at: Option<Instant>,
    intentional: bool,
    dispatcher: Dispatcher,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    status_tx: watch::Sender<LinkStatus>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Spawn the actor task and return a handle to it.
    pub fn spawn(transport: T, user: User, options: LinkOptions) -> ConnectionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let machine = LinkStateMachine::new(options.policy);
        let (status_tx, status_rx) = watch::channel(machine.status());

        let manager = Self {
            transport,
            options,
            user,
            machine,
            sink: None,
            generation: 0,
            retry_at: None,
            intentional: false,
            dispatcher: Dispatcher::new(),
            commands: command_rx,
            events_tx,
            events_rx,
            status_tx,
        };
        tokio::spawn(manager.run());

        ConnectionHandle {
            commands: command_tx,
            status: status_rx,
        }
    }

    async fn run(mut self) {
        loop {
            let step = {
                let retry_at = self.retry_at;
                tokio::select! {
                    command = self.commands.recv() => Step::Command(command),
                    event = self.events_rx.recv() => Step::Transport(event),
                    () = async {
                        if let Some(at) = retry_at {
                            tokio::time::sleep_until(at).await;
                        }
                    }, if retry_at.is_some() => Step::RetryElapsed,
                }
            };

            match step {
                Step::Command(None) | Step::Command(Some(Command::Shutdown)) => {
                    self.teardown().await;
                    return;
                }
                Step::Command(Some(command)) => self.handle_command(command).await,
                // We hold a sender for the events channel, so it never
                // closes while the actor runs.
                Step::Transport(None) => return,
                Step::Transport(Some(event)) => self.handle_transport_event(event).await,
                Step::RetryElapsed => {
                    self.retry_at = None;
                    self.trigger(LinkEvent::BackoffElapsed).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => {
                self.intentional = false;
                self.trigger(LinkEvent::ConnectRequested).await;
            }
            Command::Disconnect => {
                self.intentional = true;
                self.trigger(LinkEvent::DisconnectRequested).await;
            }
            Command::Send { event, reply } => {
                let delivered = self.try_send(&event).await;
                let _ = reply.send(delivered);
            }
            Command::Register { handler, reply } => {
                let id = self.dispatcher.subscribe(handler);
                let _ = reply.send(id);
            }
            Command::Unregister(id) => self.dispatcher.unsubscribe(id),
            Command::Shutdown => {}
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame { generation, frame } => {
                if generation != self.generation {
                    trace!(generation, "Discarding frame from stale transport");
                    return;
                }
                match protocol::decode(&frame) {
                    Ok(message) => self.dispatcher.dispatch(&message),
                    Err(error) => warn!(%error, "Discarding malformed frame"),
                }
            }
            TransportEvent::Closed { generation } => {
                if generation != self.generation {
                    trace!(generation, "Ignoring close of stale transport");
                    return;
                }
                self.sink = None;
                if self.intentional {
                    debug!("Transport closed after intentional disconnect");
                } else {
                    info!("Connection lost");
                    self.trigger(LinkEvent::ConnectionLost).await;
                }
            }
        }
    }

    async fn try_send(&mut self, event: &ClientEvent) -> bool {
        if self.machine.state() != ConnectionState::Connected {
            debug!(state = ?self.machine.state(), "Dropping outbound event, not connected");
            return false;
        }
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        let frame = match protocol::encode(event) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%error, "Failed to encode outbound event");
                return false;
            }
        };
        match sink.send(frame).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "Failed to write frame");
                false
            }
        }
    }

    /// Feed an event through the state machine and perform the actions
    /// it emits. Actions may produce follow-up events (a dial resolves
    /// to an open success or failure), which are processed in order
    /// until the machine settles.
    async fn trigger(&mut self, event: LinkEvent) {
        let mut pending = VecDeque::new();
        pending.push_back(event);
        while let Some(event) = pending.pop_front() {
            for action in self.machine.handle(event) {
                if let Some(follow_up) = self.perform(action).await {
                    pending.push_back(follow_up);
                }
            }
        }
        let _ = self.status_tx.send(self.machine.status());
    }

    async fn perform(&mut self, action: LinkAction) -> Option<LinkEvent> {
        match action {
            LinkAction::CancelRetry => {
                self.retry_at = None;
                None
            }
            LinkAction::CloseTransport => {
                self.generation += 1;
                if let Some(mut sink) = self.sink.take() {
                    let _ = sink.close().await;
                }
                None
            }
            LinkAction::OpenTransport => {
                self.generation += 1;
                let generation = self.generation;
                debug!(
                    transport = self.transport.name(),
                    endpoint = %self.options.endpoint,
                    "Opening transport"
                );
                match self.transport.dial(&self.options.endpoint).await {
                    Ok((sink, stream)) => {
                        self.sink = Some(sink);
                        tokio::spawn(read_loop(generation, stream, self.events_tx.clone()));
                        info!(endpoint = %self.options.endpoint, "Connected");
                        Some(LinkEvent::OpenSucceeded)
                    }
                    Err(error) => {
                        warn!(%error, "Transport open failed");
                        Some(LinkEvent::OpenFailed)
                    }
                }
            }
            LinkAction::ScheduleRetry(delay) => {
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.machine.attempts(),
                    "Scheduling reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
                None
            }
            LinkAction::Resubscribe => {
                self.resubscribe().await;
                None
            }
        }
    }

    /// Re-establish room subscriptions after a (re)connect.
    async fn resubscribe(&mut self) {
        let rooms = self.options.rooms.clone();
        for room in rooms {
            let subscribe = ClientEvent::subscribe(
                room.clone(),
                self.user.clone(),
                self.options.replay_history,
                self.options.history_limit,
            );
            if !self.try_send(&subscribe).await {
                warn!(room, "Failed to subscribe after connect");
                continue;
            }
            let presence = ClientEvent::presence(room.clone(), self.user.clone());
            if !self.try_send(&presence).await {
                warn!(room, "Failed to request presence after connect");
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.close().await;
        }
        debug!("Connection actor stopped");
    }
}

/// Pump frames from a transport stream into the actor. Exits when the
/// stream ends or the actor is gone.
async fn read_loop(
    generation: u64,
    mut stream: Box<dyn FrameStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(frame) = stream.next().await {
        if events
            .send(TransportEvent::Frame { generation, frame })
            .is_err()
        {
            return;
        }
    }
    let _ = events.send(TransportEvent::Closed { generation });
}
