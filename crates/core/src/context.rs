//! Per-emission context
//!
//! Carries an optional deadline from the caller down to the sink so an
//! exporter can skip work for a request that has already been abandoned.
//! The core never waits on it.

use std::time::{Duration, Instant};

/// Caller-supplied cancellation context for a single emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitContext {
    deadline: Option<Instant>,
}

impl EmitContext {
    /// Context without a deadline
    pub const fn background() -> Self {
        Self { deadline: None }
    }

    /// Context that expires at `deadline`
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline) }
    }

    /// Context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Deadline, if any
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
