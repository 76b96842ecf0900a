//! # Retry Policy
//!
//! Bounded retry with linear backoff for optimistic-concurrency loops.
//!
//! ## Where This Applies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per-product stock CAS        ← retry on VersionConflict                │
//! │  Per-customer due CAS         ← retry on VersionConflict                │
//! │  Retention cleaner deletes    ← retry on backend errors                 │
//! │                                                                         │
//! │  Interactive paths do NOT retry backend errors — a failing disk is     │
//! │  surfaced to the operator immediately. Only CAS races retry.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default 5.
    pub max_attempts: u32,
    /// Base backoff; attempt n sleeps n × base. Default 25 ms.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No sleeping between attempts. Tests and in-memory scenarios.
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    /// Sleep before the NEXT attempt after attempt `attempt` (1-based)
    /// failed. Linear: attempt 1 → 1×base, attempt 2 → 2×base.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Sleeps the backoff for a failed attempt, unless it was the last.
    pub async fn wait(&self, attempt: u32) {
        if attempt < self.max_attempts && !self.backoff.is_zero() {
            tokio::time::sleep(self.delay_after(attempt)).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(5, Duration::from_millis(25))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(1), Duration::from_millis(25));
        assert_eq!(policy.delay_after(3), Duration::from_millis(75));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts, 1);
    }
}
