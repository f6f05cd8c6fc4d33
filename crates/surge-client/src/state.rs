//! The connection lifecycle state machine.
//!
//! The machine is pure and synchronous: transport callbacks, user
//! calls, and timer expiries are fed in as [`LinkEvent`]s, and the
//! machine answers with the [`LinkAction`]s the driver must perform.
//! All reconnection policy lives here; the driver owns no lifecycle
//! logic of its own.

use std::time::Duration;
use tracing::debug;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and none wanted.
    Disconnected,
    /// A transport open is in flight.
    Connecting,
    /// The connection is established.
    Connected,
    /// The connection dropped; a retry is scheduled.
    Reconnecting,
    /// Retry attempts are exhausted. Only an explicit `connect()`
    /// leaves this state.
    Failed,
}

/// A read-only snapshot of the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Consecutive reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
}

impl LinkStatus {
    /// Whether the link is usable for sending.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Reconnection backoff policy: linearly increasing delay, bounded
/// attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay unit; attempt `n` waits `base_delay * n`.
    pub base_delay: Duration,
    /// Attempts after which the machine gives up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay for the n-th attempt (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// An input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// The user asked to connect.
    ConnectRequested,
    /// The transport open completed.
    OpenSucceeded,
    /// The transport open failed.
    OpenFailed,
    /// An established connection dropped unexpectedly.
    ConnectionLost,
    /// The user asked to disconnect.
    DisconnectRequested,
    /// The scheduled backoff delay elapsed.
    BackoffElapsed,
}

/// An action the driver must perform in response to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Open a new transport connection.
    OpenTransport,
    /// Close the transport connection, if any.
    CloseTransport,
    /// Cancel the pending retry timer, if any.
    CancelRetry,
    /// Arm the retry timer for the given delay.
    ScheduleRetry(Duration),
    /// Re-subscribe the room catalog (with history replay) and
    /// re-enable presence. Issued on every successful open.
    Resubscribe,
}

/// The connection lifecycle state machine.
#[derive(Debug)]
pub struct LinkStateMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl LinkStateMachine {
    /// Create a machine in `Disconnected` with the given policy.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempts: 0,
            policy,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive reconnect attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Snapshot for observers.
    #[must_use]
    pub fn status(&self) -> LinkStatus {
        LinkStatus {
            state: self.state,
            reconnect_attempts: self.attempts,
        }
    }

    /// Feed one event; returns the actions to perform, in order.
    pub fn handle(&mut self, event: LinkEvent) -> Vec<LinkAction> {
        use ConnectionState::{Connected, Connecting, Disconnected, Failed, Reconnecting};

        let actions = match (self.state, event) {
            // connect() is idempotent: no-op while a connection is
            // already open or in flight.
            (Connecting | Connected, LinkEvent::ConnectRequested) => vec![],
            (Disconnected | Reconnecting | Failed, LinkEvent::ConnectRequested) => {
                self.state = Connecting;
                vec![LinkAction::CancelRetry, LinkAction::OpenTransport]
            }

            (Connecting, LinkEvent::OpenSucceeded) => {
                self.state = Connected;
                self.attempts = 0;
                vec![LinkAction::Resubscribe]
            }

            (Connecting, LinkEvent::OpenFailed) | (Connected, LinkEvent::ConnectionLost) => {
                self.schedule_or_fail()
            }

            (_, LinkEvent::DisconnectRequested) => {
                self.state = Disconnected;
                self.attempts = 0;
                vec![LinkAction::CancelRetry, LinkAction::CloseTransport]
            }

            (Reconnecting, LinkEvent::BackoffElapsed) => {
                self.state = Connecting;
                vec![LinkAction::OpenTransport]
            }

            // Late or duplicate triggers (a close racing a finished
            // disconnect, a stale timer) are ignored.
            _ => vec![],
        };

        debug!(state = ?self.state, attempts = self.attempts, ?event, "Link transition");
        actions
    }

    fn schedule_or_fail(&mut self) -> Vec<LinkAction> {
        if self.attempts >= self.policy.max_attempts {
            self.state = ConnectionState::Failed;
            return vec![LinkAction::CloseTransport];
        }

        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        vec![
            LinkAction::CloseTransport,
            LinkAction::ScheduleRetry(self.policy.delay_for(self.attempts)),
        ]
    }
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> LinkStateMachine {
        LinkStateMachine::new(ReconnectPolicy {
            base_delay: Duration::from_millis(2000),
            max_attempts: 5,
        })
    }

    fn connect_successfully(m: &mut LinkStateMachine) {
        m.handle(LinkEvent::ConnectRequested);
        m.handle(LinkEvent::OpenSucceeded);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_connect_opens_transport() {
        let mut m = machine();
        let actions = m.handle(LinkEvent::ConnectRequested);

        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(
            actions,
            vec![LinkAction::CancelRetry, LinkAction::OpenTransport]
        );
    }

    #[test]
    fn test_connect_is_idempotent_while_connected() {
        let mut m = machine();
        connect_successfully(&mut m);

        assert!(m.handle(LinkEvent::ConnectRequested).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_open_resets_attempts_and_resubscribes() {
        let mut m = machine();
        m.handle(LinkEvent::ConnectRequested);
        m.handle(LinkEvent::OpenFailed);
        assert_eq!(m.attempts(), 1);

        m.handle(LinkEvent::BackoffElapsed);
        let actions = m.handle(LinkEvent::OpenSucceeded);

        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.attempts(), 0);
        assert_eq!(actions, vec![LinkAction::Resubscribe]);
    }

    #[test]
    fn test_unexpected_close_schedules_linear_backoff() {
        let mut m = machine();
        connect_successfully(&mut m);

        let actions = m.handle(LinkEvent::ConnectionLost);

        assert_eq!(m.state(), ConnectionState::Reconnecting);
        assert_eq!(m.attempts(), 1);
        assert_eq!(
            actions,
            vec![
                LinkAction::CloseTransport,
                LinkAction::ScheduleRetry(Duration::from_millis(2000)),
            ]
        );
    }

    #[test]
    fn test_backoff_delay_grows_linearly() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(2000),
            max_attempts: 5,
        };
        for n in 1..=5 {
            assert_eq!(policy.delay_for(n), Duration::from_millis(2000 * u64::from(n)));
        }
    }

    #[test]
    fn test_exhaustion_after_max_attempts() {
        let mut m = machine();
        connect_successfully(&mut m);
        m.handle(LinkEvent::ConnectionLost);

        // Retries 1 through 5 all fail.
        for n in 1..=4 {
            assert_eq!(m.attempts(), n);
            m.handle(LinkEvent::BackoffElapsed);
            let actions = m.handle(LinkEvent::OpenFailed);
            if n < 4 {
                assert!(actions.contains(&LinkAction::ScheduleRetry(
                    Duration::from_millis(2000 * u64::from(n) + 2000)
                )));
            }
        }
        assert_eq!(m.attempts(), 5);
        m.handle(LinkEvent::BackoffElapsed);
        let actions = m.handle(LinkEvent::OpenFailed);

        // The 6th attempt is never scheduled.
        assert_eq!(m.state(), ConnectionState::Failed);
        assert!(!actions
            .iter()
            .any(|a| matches!(a, LinkAction::ScheduleRetry(_))));
    }

    #[test]
    fn test_failed_state_recovers_only_via_explicit_connect() {
        let mut m = machine();
        connect_successfully(&mut m);
        m.handle(LinkEvent::ConnectionLost);
        for _ in 0..5 {
            m.handle(LinkEvent::BackoffElapsed);
            m.handle(LinkEvent::OpenFailed);
        }
        assert_eq!(m.state(), ConnectionState::Failed);

        // A stale timer firing in Failed is ignored.
        assert!(m.handle(LinkEvent::BackoffElapsed).is_empty());
        assert_eq!(m.state(), ConnectionState::Failed);

        let actions = m.handle(LinkEvent::ConnectRequested);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(actions.contains(&LinkAction::OpenTransport));
    }

    #[test]
    fn test_disconnect_cancels_retry_and_resets() {
        let mut m = machine();
        connect_successfully(&mut m);
        m.handle(LinkEvent::ConnectionLost);
        assert_eq!(m.state(), ConnectionState::Reconnecting);

        let actions = m.handle(LinkEvent::DisconnectRequested);

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.attempts(), 0);
        assert!(actions.contains(&LinkAction::CancelRetry));
        assert!(actions.contains(&LinkAction::CloseTransport));

        // The cancelled timer firing afterwards is a no-op.
        assert!(m.handle(LinkEvent::BackoffElapsed).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_close_after_disconnect_is_ignored() {
        let mut m = machine();
        connect_successfully(&mut m);
        m.handle(LinkEvent::DisconnectRequested);

        // The transport close callback arriving late must not start
        // a reconnect cycle.
        assert!(m.handle(LinkEvent::ConnectionLost).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }
}
