//! Heartbeat-based liveness detection.
//!
//! The monitor is ticked by the orchestrator once per loop iteration. It
//! sends at most one heartbeat per interval and declares the connection dead
//! after too many consecutive misses. It never reconnects by itself.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::SessionProtocol;
use crate::config::Timings;
use crate::core::{BlobStore, LivenessError, Transport};

/// Result of a liveness tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// Not due yet.
    Skipped,
    /// Sent and acknowledged.
    Acknowledged,
    /// Sent and not acknowledged; `failures` consecutive misses so far.
    Missed {
        /// Consecutive misses.
        failures: u32,
    },
}

/// Rate-limited heartbeat sender with a consecutive-failure bound.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    interval: Duration,
    max_failures: u32,
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
    failures: u32,
}

impl LivenessMonitor {
    /// Create a monitor. The first tick sends immediately.
    pub fn new(timings: Timings) -> Self {
        Self {
            interval: timings.heartbeat_interval,
            max_failures: timings.max_retries,
            last_attempt: None,
            last_success: None,
            failures: 0,
        }
    }

    /// Consecutive heartbeat failures.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Time of the last acknowledged heartbeat.
    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Whether a heartbeat is due at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_attempt
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Forget failures after a fresh connection; the next tick sends.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.last_attempt = None;
    }

    /// Send a heartbeat if one is due.
    pub async fn tick<S: BlobStore, T: Transport>(
        &mut self,
        now: Instant,
        protocol: &mut SessionProtocol<S>,
        transport: &mut T,
    ) -> Result<Heartbeat, LivenessError> {
        if !self.is_due(now) {
            return Ok(Heartbeat::Skipped);
        }

        self.last_attempt = Some(now);
        match protocol.send_heartbeat(transport).await {
            Ok(()) => {
                self.failures = 0;
                self.last_success = Some(now);
                Ok(Heartbeat::Acknowledged)
            }
            Err(e) => {
                self.failures += 1;
                warn!(failures = self.failures, error = %e, "heartbeat missed");
                if self.failures >= self.max_failures {
                    debug!(failures = self.failures, "liveness bound reached");
                    return Err(LivenessError::Fatal {
                        failures: self.failures,
                    });
                }
                Ok(Heartbeat::Missed {
                    failures: self.failures,
                })
            }
        }
    }
}
