//! Derivation of outgoing typing signals from raw input changes.
//!
//! The debouncer is deterministic: callers feed it input changes and
//! the current time, and it returns the typing signals to put on the
//! wire. The driver in `surge-client` owns the single idle timer and
//! calls [`TypingDebouncer::poll`] when the deadline it was handed
//! expires. At most one deadline is live at a time, scoped to the
//! room currently being typed in; superseding input moves it.

use std::time::{Duration, Instant};
use tracing::trace;

/// Idle period after the last keystroke before typing stops.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// An outgoing typing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// The local user started composing.
    Start,
    /// The local user stopped composing.
    Stop,
}

/// A signal plus the room it targets.
pub type TypingEmission = (String, TypingSignal);

/// Debounces raw text-input changes into typing start/stop signals.
#[derive(Debug)]
pub struct TypingDebouncer {
    idle_timeout: Duration,
    /// Room a `Start` has been emitted for and not yet stopped.
    active_room: Option<String>,
    /// When the pending idle `Stop` fires, if armed.
    deadline: Option<Instant>,
}

impl TypingDebouncer {
    /// Create a debouncer with the default 3-second idle timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    /// Create a debouncer with a custom idle timeout.
    #[must_use]
    pub fn with_timeout(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            active_room: None,
            deadline: None,
        }
    }

    /// The pending idle deadline the driver should sleep until.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Feed a text-input change for a room.
    ///
    /// Non-empty input emits `Start` once and (re)arms the idle
    /// deadline; empty input emits `Stop` and disarms it. Input in a
    /// different room than the one currently signaled stops the old
    /// room first so no stale `Stop` can leak into the wrong room.
    pub fn input_changed(&mut self, room: &str, text: &str, now: Instant) -> Vec<TypingEmission> {
        let mut out = Vec::new();

        if let Some(active) = self.active_room.as_deref() {
            if active != room {
                out.push((active.to_string(), TypingSignal::Stop));
                self.active_room = None;
                self.deadline = None;
            }
        }

        if text.is_empty() {
            out.push((room.to_string(), TypingSignal::Stop));
            self.active_room = None;
            self.deadline = None;
            return out;
        }

        if self.active_room.as_deref() != Some(room) {
            out.push((room.to_string(), TypingSignal::Start));
            self.active_room = Some(room.to_string());
        }
        self.deadline = Some(now + self.idle_timeout);
        trace!(%room, "Typing deadline re-armed");
        out
    }

    /// The local user submitted a message in a room.
    ///
    /// Emits `Stop` and disarms the deadline.
    pub fn submitted(&mut self, room: &str) -> TypingEmission {
        self.active_room = None;
        self.deadline = None;
        (room.to_string(), TypingSignal::Stop)
    }

    /// The active room changed without input.
    ///
    /// Stops the previously signaled room, if any, and cancels its
    /// pending deadline.
    pub fn switch_room(&mut self) -> Option<TypingEmission> {
        self.deadline = None;
        self.active_room
            .take()
            .map(|room| (room, TypingSignal::Stop))
    }

    /// Check the idle deadline.
    ///
    /// Emits `Stop` for the signaled room when the deadline has
    /// passed; otherwise a no-op.
    pub fn poll(&mut self, now: Instant) -> Option<TypingEmission> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.active_room
            .take()
            .map(|room| (room, TypingSignal::Stop))
    }

    /// Drop all state without emitting. Used at teardown.
    pub fn reset(&mut self) {
        self.active_room = None;
        self.deadline = None;
    }
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_start_emitted_once_per_burst() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();

        let first = debouncer.input_changed("lobby", "h", now);
        assert_eq!(first, vec![("lobby".to_string(), TypingSignal::Start)]);

        // Further keystrokes only re-arm the deadline.
        let second = debouncer.input_changed("lobby", "he", now + Duration::from_secs(1));
        assert!(second.is_empty());
        assert_eq!(
            debouncer.deadline(),
            Some(now + Duration::from_secs(1) + DEFAULT_IDLE_TIMEOUT)
        );
    }

    #[test]
    fn test_idle_deadline_emits_stop() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();
        debouncer.input_changed("lobby", "h", now);

        // Not yet.
        assert_eq!(debouncer.poll(now + Duration::from_secs(2)), None);

        let stop = debouncer.poll(now + Duration::from_secs(3));
        assert_eq!(stop, Some(("lobby".to_string(), TypingSignal::Stop)));

        // Deadline disarmed; polling again is a no-op.
        assert_eq!(debouncer.poll(now + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_empty_input_stops_and_disarms() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();
        debouncer.input_changed("lobby", "h", now);

        let out = debouncer.input_changed("lobby", "", now + Duration::from_secs(1));
        assert_eq!(out, vec![("lobby".to_string(), TypingSignal::Stop)]);
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn test_submission_stops_and_disarms() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();
        debouncer.input_changed("lobby", "hey", now);

        assert_eq!(
            debouncer.submitted("lobby"),
            ("lobby".to_string(), TypingSignal::Stop)
        );
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(now + Duration::from_secs(10)), None);
    }

    #[test]
    fn test_room_switch_stops_prior_room_only() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();
        debouncer.input_changed("lobby", "h", now);

        let out = debouncer.input_changed("games", "g", now + Duration::from_secs(1));
        assert_eq!(
            out,
            vec![
                ("lobby".to_string(), TypingSignal::Stop),
                ("games".to_string(), TypingSignal::Start),
            ]
        );

        // The pending deadline now belongs to the new room.
        let stop = debouncer.poll(now + Duration::from_secs(5));
        assert_eq!(stop, Some(("games".to_string(), TypingSignal::Stop)));
    }

    #[test]
    fn test_explicit_switch_room_cancels_timer() {
        let mut debouncer = TypingDebouncer::new();
        let now = t0();
        debouncer.input_changed("lobby", "h", now);

        let stop = debouncer.switch_room();
        assert_eq!(stop, Some(("lobby".to_string(), TypingSignal::Stop)));
        assert_eq!(debouncer.deadline(), None);

        // Nothing signaled: switching again emits nothing.
        assert_eq!(debouncer.switch_room(), None);
    }

    #[test]
    fn test_reset_emits_nothing() {
        let mut debouncer = TypingDebouncer::new();
        debouncer.input_changed("lobby", "h", t0());

        debouncer.reset();
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.switch_room(), None);
    }
}
