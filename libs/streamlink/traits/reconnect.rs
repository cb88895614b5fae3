use std::time::Duration;

/// Trait for defining reconnection policies
///
/// The attempt number passed in is 1-based: the supervisor increments its
/// counter *before* asking for a delay, so the first retry is attempt 1.
pub trait ReconnectPolicy: Send + Sync {
    /// Get the delay before the given reconnection attempt
    ///
    /// # Returns
    /// * `Some(duration)` - Wait this long before reconnecting
    /// * `None` - Stop reconnecting (the connection is considered failed)
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Check if the given attempt is still allowed
    fn should_reconnect(&self, attempt: usize) -> bool;
}

/// Linear backoff reconnection policy
///
/// Delay grows linearly with the attempt number: `base * attempt`, with a
/// hard cap on the number of attempts. After the cap the connection is
/// surfaced as failed and never retried automatically.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base_delay: Duration,
    max_attempts: usize,
}

impl LinearBackoff {
    /// Create a new linear backoff policy
    ///
    /// # Arguments
    /// * `base_delay` - Multiplied by the attempt number to get the delay
    /// * `max_attempts` - Attempts beyond this return `None`
    pub fn new(base_delay: Duration, max_attempts: usize) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for LinearBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        let millis = self.base_delay.as_millis() as u64;
        Some(Duration::from_millis(millis.saturating_mul(attempt as u64)))
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        attempt <= self.max_attempts
    }
}

/// Fixed delay reconnection policy
///
/// Always waits the same amount of time between reconnection attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// Create a new fixed delay policy (`None` = unlimited attempts)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !self.should_reconnect(attempt) {
            return None;
        }
        Some(self.delay)
    }

    fn should_reconnect(&self, attempt: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Never reconnect policy
///
/// The client will not attempt to reconnect after disconnection
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectPolicy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }

    fn should_reconnect(&self, _attempt: usize) -> bool {
        false
    }
}
