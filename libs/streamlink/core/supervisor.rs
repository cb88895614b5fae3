//! Connection supervisor: the reconnect state machine.
//!
//! The async client translates transport callbacks into discrete
//! [`ConnEvent`]s and feeds them here; the supervisor answers with a
//! [`ConnDirective`] telling it what to do next. Keeping the transitions
//! in a plain struct makes the whole lifecycle testable by feeding
//! synthetic event sequences, no socket required.

use crate::traits::ReconnectPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::connection_state::{AtomicConnectionState, ConnectionState};

/// A discrete connection lifecycle event
#[derive(Debug, Clone)]
pub enum ConnEvent {
    /// The channel opened successfully
    Opened,
    /// The channel closed abnormally after being open for `uptime`
    Closed { uptime: Duration },
    /// A connection attempt failed before the channel opened
    ConnectFailed,
    /// Graceful teardown was requested
    ShutdownRequested,
}

/// What the client should do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnDirective {
    /// Nothing to do; carry on
    Continue,
    /// Wait this long, then attempt to reconnect
    RetryAfter(Duration),
    /// Retry budget exhausted or shutdown requested; stop for good
    GiveUp,
}

/// Event-driven reconnect state machine.
///
/// Owns the attempt counter and the shared state cell. The counter resets
/// to zero on every successful open, and also before counting a close that
/// followed a long stable connection, so one flaky blip after hours of
/// uptime does not inherit a stale attempt history.
pub struct ConnectionSupervisor {
    state: Arc<AtomicConnectionState>,
    policy: Box<dyn ReconnectPolicy>,
    attempts: usize,
    /// Connections that stayed up at least this long reset the counter
    stable_after: Duration,
}

impl ConnectionSupervisor {
    pub fn new(
        state: Arc<AtomicConnectionState>,
        policy: Box<dyn ReconnectPolicy>,
        stable_after: Duration,
    ) -> Self {
        Self {
            state,
            policy,
            attempts: 0,
            stable_after,
        }
    }

    /// Current reconnect attempt count
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Apply one lifecycle event and return the next directive
    pub fn on_event(&mut self, event: ConnEvent) -> ConnDirective {
        match event {
            ConnEvent::Opened => {
                self.attempts = 0;
                self.state.set(ConnectionState::Connected);
                debug!("[Supervisor] Connected, attempt counter reset");
                ConnDirective::Continue
            }
            ConnEvent::Closed { uptime } => {
                if uptime >= self.stable_after && self.attempts > 0 {
                    debug!(
                        "[Supervisor] Connection was stable for {:?}, resetting attempt counter",
                        uptime
                    );
                    self.attempts = 0;
                }
                self.schedule_retry("abnormal close")
            }
            ConnEvent::ConnectFailed => self.schedule_retry("connect failure"),
            ConnEvent::ShutdownRequested => {
                self.state.set(ConnectionState::ShuttingDown);
                ConnDirective::GiveUp
            }
        }
    }

    /// Increment the counter, then ask the policy for a delay.
    fn schedule_retry(&mut self, reason: &str) -> ConnDirective {
        if self.state.is_shutting_down() {
            return ConnDirective::GiveUp;
        }

        self.attempts += 1;
        match self.policy.next_delay(self.attempts) {
            Some(delay) => {
                self.state.set(ConnectionState::Reconnecting);
                debug!(
                    "[Supervisor] {} - reconnecting in {:?} (attempt {})",
                    reason, delay, self.attempts
                );
                ConnDirective::RetryAfter(delay)
            }
            None => {
                self.state.set(ConnectionState::Failed);
                warn!(
                    "[Supervisor] {} - retry budget exhausted after {} attempts, giving up",
                    reason, self.attempts
                );
                ConnDirective::GiveUp
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LinearBackoff;

    fn supervisor(max_attempts: usize) -> (ConnectionSupervisor, Arc<AtomicConnectionState>) {
        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Disconnected));
        let sup = ConnectionSupervisor::new(
            Arc::clone(&state),
            Box::new(LinearBackoff::new(Duration::from_millis(100), max_attempts)),
            Duration::from_secs(60),
        );
        (sup, state)
    }

    #[test]
    fn linear_backoff_delays_grow_with_attempts() {
        let (mut sup, state) = supervisor(5);

        assert_eq!(
            sup.on_event(ConnEvent::Closed {
                uptime: Duration::from_secs(1)
            }),
            ConnDirective::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            sup.on_event(ConnEvent::ConnectFailed),
            ConnDirective::RetryAfter(Duration::from_millis(200))
        );
        assert_eq!(
            sup.on_event(ConnEvent::ConnectFailed),
            ConnDirective::RetryAfter(Duration::from_millis(300))
        );
        assert_eq!(state.get(), ConnectionState::Reconnecting);
    }

    #[test]
    fn exhausting_the_budget_transitions_to_failed() {
        let (mut sup, state) = supervisor(3);

        for _ in 0..3 {
            assert!(matches!(
                sup.on_event(ConnEvent::ConnectFailed),
                ConnDirective::RetryAfter(_)
            ));
        }
        assert_eq!(sup.on_event(ConnEvent::ConnectFailed), ConnDirective::GiveUp);
        assert_eq!(state.get(), ConnectionState::Failed);

        // Failed is terminal: further closes never schedule retries
        assert_eq!(
            sup.on_event(ConnEvent::Closed {
                uptime: Duration::ZERO
            }),
            ConnDirective::GiveUp
        );
    }

    #[test]
    fn successful_open_resets_the_attempt_counter() {
        let (mut sup, state) = supervisor(3);

        sup.on_event(ConnEvent::ConnectFailed);
        sup.on_event(ConnEvent::ConnectFailed);
        assert_eq!(sup.attempts(), 2);

        sup.on_event(ConnEvent::Opened);
        assert_eq!(sup.attempts(), 0);
        assert_eq!(state.get(), ConnectionState::Connected);

        // The next close starts over from attempt 1
        assert_eq!(
            sup.on_event(ConnEvent::Closed {
                uptime: Duration::from_secs(1)
            }),
            ConnDirective::RetryAfter(Duration::from_millis(100))
        );
    }

    #[test]
    fn stable_connection_resets_before_counting_the_close() {
        let (mut sup, _state) = supervisor(3);

        sup.on_event(ConnEvent::ConnectFailed);
        sup.on_event(ConnEvent::ConnectFailed);

        // Long uptime before this close wipes the history first
        assert_eq!(
            sup.on_event(ConnEvent::Closed {
                uptime: Duration::from_secs(3600)
            }),
            ConnDirective::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(sup.attempts(), 1);
    }

    #[test]
    fn shutdown_always_gives_up() {
        let (mut sup, state) = supervisor(3);
        assert_eq!(
            sup.on_event(ConnEvent::ShutdownRequested),
            ConnDirective::GiveUp
        );
        assert_eq!(state.get(), ConnectionState::ShuttingDown);
        assert_eq!(sup.on_event(ConnEvent::ConnectFailed), ConnDirective::GiveUp);
    }
}
