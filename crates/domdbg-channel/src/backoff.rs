use std::time::Duration;

/// Linear backoff between thread-list polls.
///
/// The delay grows by a fixed increment on every iteration without an upper
/// bound: prompt detection is traded against poll overhead, and a halt is
/// expected long before the delay becomes large. Deliberately not
/// exponential.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PollBackoff {
    delay: Duration,
    increment: Duration,
}

impl PollBackoff {
    pub(crate) const fn new(increment: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            increment,
        }
    }

    /// Delay to sleep before the next poll.
    pub(crate) fn next_delay(&mut self) -> Duration {
        self.delay += self.increment;
        self.delay
    }
}
