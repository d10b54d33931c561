//! Supervisor timing and retry configuration.

use std::time::Duration;

/// Default interval between event-loop iterations (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default interval between periodic checkpoints (seconds).
pub const DEFAULT_CHECKPOINT_INTERVAL_SECS: u64 = 30;

/// Default extra checkpoint attempts after a failed shutdown checkpoint.
pub const DEFAULT_CHECKPOINT_RETRIES: u32 = 0;

/// Configuration shared by every supervisor a registry starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Sleep between loop iterations; bounds stop latency.
    pub poll_interval: Duration,

    /// Minimum time between periodic checkpoints.
    pub checkpoint_interval: Duration,

    /// How many times a failed checkpoint is re-requested once the
    /// download is draining. Zero exits best-effort on the first failure.
    pub checkpoint_retries: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            checkpoint_interval: Duration::from_secs(DEFAULT_CHECKPOINT_INTERVAL_SECS),
            checkpoint_retries: DEFAULT_CHECKPOINT_RETRIES,
        }
    }
}

impl SupervisorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_checkpoint_retries(mut self, retries: u32) -> Self {
        self.checkpoint_retries = retries;
        self
    }
}
