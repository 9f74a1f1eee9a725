use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use super::escalation::AuthEscalation;
use super::wait_for_shutdown;
use crate::api::{Listing, MarketplaceClient, SearchCriteria};
use crate::core::config::WorkerConfig;
use crate::core::error::{ApiError, CycleError};
use crate::notify::format::{format_auth_escalation, format_inventory_summary};
use crate::notify::Notifier;
use crate::store::SeenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Fetching,
    Filtering,
    Notifying,
    Done,
    Errored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCounts {
    pub fetched: usize,
    pub new: usize,
    pub notified: usize,
    pub failed: usize,
}

/// What one cycle found and what went wrong along the way.
#[derive(Debug, Default)]
pub struct PollResult {
    pub new_listings: Vec<Listing>,
    pub errors: Vec<CycleError>,
}

#[derive(Debug)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub state: CycleState,
    pub counts: CycleCounts,
    pub attempts: u32,
    pub result: PollResult,
    /// Shutdown arrived mid-batch; the remaining listings stay unmarked for next time.
    pub interrupted: bool,
    pub duration: Duration,
}

impl CycleReport {
    pub fn is_errored(&self) -> bool {
        self.state == CycleState::Errored
    }

    /// The error that ended an errored cycle.
    pub fn fatal_error(&self) -> Option<&CycleError> {
        if self.is_errored() {
            self.result.errors.last()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `failed_attempt + 1`: base, 2×base, 4×base, …
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

/// Next step after one search attempt.
#[derive(Debug)]
enum FetchDecision {
    Proceed(Vec<Listing>),
    RetryAfter(Duration),
    Abort(CycleError),
}

fn decide(
    outcome: Result<Vec<Listing>, ApiError>,
    attempt: u32,
    policy: &RetryPolicy,
) -> FetchDecision {
    match outcome {
        Ok(listings) => FetchDecision::Proceed(listings),
        Err(ApiError::Transient { .. }) if attempt < policy.max_attempts => {
            FetchDecision::RetryAfter(policy.delay_after(attempt))
        }
        Err(last @ ApiError::Transient { .. }) => {
            FetchDecision::Abort(CycleError::RetriesExhausted { attempts: attempt, last })
        }
        Err(ApiError::Auth(msg)) => FetchDecision::Abort(CycleError::Auth(msg)),
        Err(ApiError::Data(msg)) => FetchDecision::Abort(CycleError::Data(msg)),
    }
}

/// Progress of first-run seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedPhase {
    Off,
    /// Seeding requested; the store has not been checked for emptiness yet.
    CheckStore,
    /// The store was empty; keep marking until one full pass succeeds.
    Marking,
}

/// Something the scheduler can run once per tick.
#[async_trait]
pub trait CycleRunner: Send {
    async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> CycleReport;
}

/// One fetch → filter → notify → mark pass over the saved search.
pub struct PollCycle {
    client: Box<dyn MarketplaceClient>,
    store: Arc<dyn SeenStore>,
    notifier: Arc<dyn Notifier>,
    criteria: SearchCriteria,
    retry: RetryPolicy,
    retention: ChronoDuration,
    escalation: AuthEscalation,
    seeding: SeedPhase,
    summary_pending: bool,
}

impl PollCycle {
    pub fn new(
        client: Box<dyn MarketplaceClient>,
        store: Arc<dyn SeenStore>,
        notifier: Arc<dyn Notifier>,
        criteria: SearchCriteria,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            criteria,
            retry: RetryPolicy::default(),
            retention: ChronoDuration::days(30),
            escalation: AuthEscalation::new(5),
            seeding: SeedPhase::Off,
            summary_pending: false,
        }
    }

    pub fn with_worker_config(mut self, config: &WorkerConfig) -> Self {
        self.retry = RetryPolicy {
            max_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_secs(config.retry_base_delay_secs),
        };
        self.retention = ChronoDuration::days(config.retention_days);
        self.escalation = AuthEscalation::new(config.auth_escalation_threshold);
        self = self.with_seeding(config.seed_existing);
        self.summary_pending = config.startup_summary;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retention(mut self, retention: ChronoDuration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_auth_escalation(mut self, threshold: u32) -> Self {
        self.escalation = AuthEscalation::new(threshold);
        self
    }

    /// Mark everything from the first successful fetch as seen, without notifying,
    /// when the store starts out empty.
    pub fn with_seeding(mut self, enabled: bool) -> Self {
        self.seeding = if enabled {
            SeedPhase::CheckStore
        } else {
            SeedPhase::Off
        };
        self
    }

    /// Post a summary of the current matches after the first successful fetch.
    pub fn with_inventory_summary(mut self, enabled: bool) -> Self {
        self.summary_pending = enabled;
        self
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub async fn run(&mut self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("poll_cycle", %cycle_id);
        self.run_inner(cycle_id, shutdown).instrument(span).await
    }

    async fn run_inner(&mut self, cycle_id: Uuid, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            cycle_id,
            state: CycleState::Fetching,
            counts: CycleCounts::default(),
            attempts: 0,
            result: PollResult::default(),
            interrupted: false,
            duration: Duration::ZERO,
        };

        tracing::debug!("🔍 Searching eBay for {:?}", self.criteria.keywords);
        let listings = match self.fetch(&mut report, shutdown).await {
            Ok(listings) => listings,
            Err(err) => return self.finish_errored(report, err, started).await,
        };
        report.counts.fetched = listings.len();

        if self.summary_pending {
            self.send_inventory_summary(&listings).await;
        }

        if self.seeding != SeedPhase::Off {
            match self.seed(&listings).await {
                Ok(true) => {
                    report.counts.new = listings.len();
                    return self.finish_done(report, started).await;
                }
                Ok(false) => {}
                Err(err) => return self.finish_errored(report, err, started).await,
            }
        }

        report.state = CycleState::Filtering;
        let mut fresh = Vec::new();
        for listing in listings {
            match self.store.is_new(&listing.id).await {
                Ok(true) => fresh.push(listing),
                Ok(false) => {}
                Err(e) => return self.finish_errored(report, e.into(), started).await,
            }
        }
        report.counts.new = fresh.len();

        report.state = CycleState::Notifying;
        for listing in &fresh {
            if *shutdown.borrow() {
                tracing::warn!("🛑 Shutdown requested, leaving remaining listings for next run");
                report.interrupted = true;
                break;
            }

            let seen_at = Utc::now();
            match self.notifier.notify(&listing.seen_at(seen_at)).await {
                Ok(()) => {
                    report.counts.notified += 1;
                    if let Err(e) = self.store.mark_seen(&listing.id, seen_at).await {
                        // already sent; it will be sent again next cycle
                        tracing::error!(
                            listing_id = %listing.id,
                            "Failed to mark listing seen: {}",
                            e
                        );
                        report.result.errors.push(e.into());
                    }
                }
                Err(source) => {
                    report.counts.failed += 1;
                    tracing::warn!(
                        listing_id = %listing.id,
                        "📭 Notification failed, will retry next cycle: {}",
                        source
                    );
                    report.result.errors.push(CycleError::Delivery {
                        listing_id: listing.id.clone(),
                        source,
                    });
                }
            }
        }
        report.result.new_listings = fresh;

        self.finish_done(report, started).await
    }

    /// FETCHING with bounded exponential backoff on transient failures.
    async fn fetch(
        &mut self,
        report: &mut CycleReport,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Vec<Listing>, CycleError> {
        let mut shutdown = shutdown.clone();
        loop {
            report.attempts += 1;
            let outcome = self.client.search(&self.criteria).await;

            match decide(outcome, report.attempts, &self.retry) {
                FetchDecision::Proceed(listings) => {
                    self.escalation.record_success();
                    return Ok(listings);
                }
                FetchDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        "⏳ Transient eBay failure on attempt {}/{}, retrying in {:?}",
                        report.attempts,
                        self.retry.max_attempts,
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = wait_for_shutdown(&mut shutdown) => return Err(CycleError::Cancelled),
                    }
                }
                FetchDecision::Abort(err) => {
                    if err.is_auth() {
                        self.escalate_auth_failure(&err).await;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Returns whether seeding happened (only into an empty store). A failed pass leaves
    /// seeding pending, and the emptiness check is not repeated once marking has begun.
    async fn seed(&mut self, listings: &[Listing]) -> Result<bool, CycleError> {
        if self.seeding == SeedPhase::CheckStore {
            if self.store.count().await? > 0 {
                tracing::info!("Seen-item store already populated, skipping initial seeding");
                self.seeding = SeedPhase::Off;
                return Ok(false);
            }
            self.seeding = SeedPhase::Marking;
        }

        let now = Utc::now();
        for listing in listings {
            self.store.mark_seen(&listing.id, now).await?;
        }
        self.seeding = SeedPhase::Off;
        tracing::info!(
            "🌱 Seeded {} existing listings as seen without notifying",
            listings.len()
        );
        Ok(true)
    }

    async fn send_inventory_summary(&mut self, listings: &[Listing]) {
        let text = format_inventory_summary(&self.criteria, listings);
        match self.notifier.send_text(&text).await {
            Ok(()) => self.summary_pending = false,
            Err(e) => tracing::warn!(
                "Failed to deliver inventory summary, retrying next cycle: {}",
                e
            ),
        }
    }

    async fn escalate_auth_failure(&mut self, err: &CycleError) {
        if !self.escalation.record_auth_failure() {
            return;
        }

        let failures = self.escalation.consecutive_failures();
        tracing::error!(
            "🚨 Authentication failed for {} consecutive cycles - credentials need renewal",
            failures
        );
        let text = format_auth_escalation(failures, &err.to_string());
        if let Err(e) = self.notifier.send_text(&text).await {
            tracing::error!("Failed to deliver auth escalation: {}", e);
        }
    }

    async fn evict_stale(&self) {
        let Some(threshold) = Utc::now().checked_sub_signed(self.retention) else {
            tracing::warn!(
                "Retention window {} is out of range, skipping eviction",
                self.retention
            );
            return;
        };
        match self.store.evict_older_than(threshold).await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::info!("🧹 Evicted {} seen entries older than {}", removed, threshold)
            }
            Err(e) => tracing::warn!("Seen-item eviction failed: {}", e),
        }
    }

    async fn finish_done(&self, mut report: CycleReport, started: Instant) -> CycleReport {
        self.evict_stale().await;

        report.state = CycleState::Done;
        report.duration = started.elapsed();
        let c = report.counts;
        tracing::info!(
            fetched = c.fetched,
            new = c.new,
            notified = c.notified,
            failed = c.failed,
            "✅ Cycle complete in {:.2}s",
            report.duration.as_secs_f64()
        );
        report
    }

    async fn finish_errored(
        &self,
        mut report: CycleReport,
        err: CycleError,
        started: Instant,
    ) -> CycleReport {
        tracing::error!(attempts = report.attempts, "❌ Cycle errored: {}", err);

        report.state = CycleState::Errored;
        report.duration = started.elapsed();
        report.result.errors.push(err);
        report
    }
}

#[async_trait]
impl CycleRunner for PollCycle {
    async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        self.run(shutdown).await
    }
}
