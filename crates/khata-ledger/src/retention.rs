//! # Retention Cleaner
//!
//! Ages old sales (and their children) out of the store.
//!
//! ## Cascade
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cutoff = now − window (default 40 days)                                │
//! │                                                                         │
//! │  For each sale older than the cutoff, oldest first:                     │
//! │    1. payments linked to the sale                                       │
//! │    2. the sale header            ← parent goes before its lines, so a  │
//! │    3. stock reservation markers     crash leaves orphans (caught by    │
//! │    4. line items                    the sweep), never headless lines   │
//! │                                     that look like live sales          │
//! │                                                                         │
//! │  Then: an age-based sweep of sale_items removes lines older than the   │
//! │  cutoff whose header is already gone (orphans from a past crash).      │
//! │                                                                         │
//! │  Each run deletes at most `batch_limit` documents (default 300); a     │
//! │  backlog drains over successive runs. Re-running with the same cutoff  │
//! │  is a no-op. Only documents older than the cutoff are ever touched,    │
//! │  so the cleaner is safe alongside live sale traffic.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike the interactive paths, the cleaner retries store failures with
//! backoff; nobody is waiting on it.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use khata_store::Store;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Sales older than this many days are removed.
    pub window_days: i64,
    /// Ceiling on documents deleted per run.
    pub batch_limit: u32,
    /// Store-failure retry for a whole batch.
    pub retry: RetryPolicy,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            window_days: 40,
            batch_limit: 300,
            retry: RetryPolicy::new(3, Duration::from_millis(250)),
        }
    }
}

/// What one run removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupStats {
    pub sales: u64,
    pub lines: u64,
    pub payments: u64,
    pub markers: u64,
    pub orphan_lines: u64,
}

impl CleanupStats {
    pub fn total(&self) -> u64 {
        self.sales + self.lines + self.payments + self.markers + self.orphan_lines
    }
}

// =============================================================================
// RetentionCleaner
// =============================================================================

#[derive(Clone)]
pub struct RetentionCleaner {
    store: Store,
    config: RetentionConfig,
}

impl RetentionCleaner {
    pub fn new(store: Store, config: RetentionConfig) -> Self {
        RetentionCleaner { store, config }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::days(self.config.window_days)
    }

    /// One bounded cleanup pass. Store failures are retried per the policy;
    /// the bound is surfaced once exhausted.
    pub async fn run_once(&self, now: DateTime<Utc>) -> LedgerResult<CleanupStats> {
        let cutoff = self.cutoff(now);
        let mut last_err: Option<LedgerError> = None;

        for attempt in 1..=self.config.retry.max_attempts {
            match self.clean(cutoff).await {
                Ok(stats) => {
                    if stats.total() > 0 {
                        info!(
                            %cutoff,
                            sales = stats.sales,
                            lines = stats.lines,
                            payments = stats.payments,
                            markers = stats.markers,
                            orphan_lines = stats.orphan_lines,
                            "retention pass removed documents"
                        );
                    } else {
                        debug!(%cutoff, "retention pass found nothing to remove");
                    }
                    return Ok(stats);
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt, error = %err, "retention pass failed, will retry");
                    last_err = Some(err);
                    self.config.retry.wait(attempt).await;
                }
                Err(err) => return Err(err),
            }
        }

        // retry bound exhausted; last_err is always set on this path
        Err(last_err.unwrap_or(LedgerError::Conflict {
            entity: "retention",
            id: String::new(),
            attempts: self.config.retry.max_attempts,
        }))
    }

    /// Runs `run_once` on a fixed interval until the shutdown channel fires
    /// or closes. Spawn this as a background task.
    pub async fn run_periodic(self, every: Duration, mut shutdown: mpsc::Receiver<()>) {
        info!(interval_secs = every.as_secs(), "retention cleaner starting");

        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        error!(error = %e, "retention pass failed after retries");
                    }
                }
                _ = shutdown.recv() => {
                    info!("retention cleaner stopping");
                    break;
                }
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn clean(&self, cutoff: DateTime<Utc>) -> LedgerResult<CleanupStats> {
        let mut stats = CleanupStats::default();
        let mut budget = self.config.batch_limit as u64;

        let expired = self
            .store
            .sales()
            .older_than(cutoff, self.config.batch_limit)
            .await?;

        for sale in expired {
            if budget == 0 {
                return Ok(stats);
            }

            // Payments first: once the header is gone a crash here would
            // leave payment rows no sweep can attribute
            let payments = self.store.payments().for_sale(&sale.id).await?;
            let payment_ids: Vec<String> = payments.into_iter().map(|p| p.id).collect();
            if !payment_ids.is_empty() {
                stats.payments += self.store.payments().remove_many(&payment_ids).await?;
            }

            // Header before children: the age sweep below recovers orphaned
            // lines, but nothing recovers a headless header
            self.store.sales().remove(&sale.id).await?;
            stats.sales += 1;

            for marker in self.store.movements().for_sale(&sale.id).await? {
                self.store.movements().remove(&sale.id, &marker.product_id).await?;
                stats.markers += 1;
            }

            stats.lines += self.store.sales().remove_lines(&sale.id).await?;
            budget = (self.config.batch_limit as u64).saturating_sub(stats.total());
        }

        // Sweep: lines past the cutoff whose header no longer exists
        if budget > 0 {
            let stale_lines = self
                .store
                .sales()
                .lines_older_than(cutoff, budget.min(u32::MAX as u64) as u32)
                .await?;
            let mut orphan_ids = Vec::new();
            for line in stale_lines {
                if self.store.sales().try_get(&line.sale_id).await?.is_none() {
                    orphan_ids.push(line.id);
                }
            }
            if !orphan_ids.is_empty() {
                stats.orphan_lines += self.store.sales().remove_lines_by_id(&orphan_ids).await?;
            }
        }

        Ok(stats)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
