//! Cancellable scheduled tasks and reconnect backoff.
//!
//! The session never sleeps itself. Each timer is a [`ScheduledTask`]
//! holding an optional deadline; the driver asks for the earliest deadline,
//! waits for it, and hands the current instant back so due tasks fire.
//! Cancelling is clearing the deadline, so a cancelled retry can never fire
//! late.

use std::time::{Duration, Instant};

/// A one-shot timer that can be re-armed or cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduledTask {
    due: Option<Instant>,
}

impl ScheduledTask {
    pub const fn idle() -> Self {
        Self { due: None }
    }

    /// Arm the task `delay` after `now`, replacing any earlier deadline.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.due = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.due = None;
    }

    pub fn is_scheduled(&self) -> bool {
        self.due.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.due
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.due {
            Some(due) if due <= now => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// Delay before reconnect attempt number `retry_count` (zero based).
///
/// `base * 2^retry_count`, capped at `max`. Saturates instead of overflowing,
/// so the sequence is non-decreasing for any retry count.
pub fn backoff_delay(base: Duration, max: Duration, retry_count: u32) -> Duration {
    let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(max)
}

/// Earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
