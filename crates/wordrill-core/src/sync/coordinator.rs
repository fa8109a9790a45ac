//! Sync coordinator
//!
//! The public façade over the engine: gates whether sync may run,
//! offers typed enqueue calls per entity kind, owns the recurring
//! background job, and funnels immediate run requests through the
//! single-flight guard. One coordinator is constructed per process and
//! handed to whatever needs it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    priority, AchievementPayload, ActionType, ExamPayload, ProfilePayload, StatisticPayload,
    SyncPayload, SyncStatistics, WordPayload,
};
use crate::sync::connectivity::ConnectivityMonitor;
use crate::sync::executor::{SyncExecutor, SyncOutcome};
use crate::sync::gate::SyncGate;
use crate::sync::remote::RemoteSyncApi;
use crate::sync::repository::{SyncRepository, DEFAULT_DAYS_TO_KEEP, DEFAULT_MAX_ATTEMPTS};
use crate::sync::single_flight::{RunRequest, SingleFlight};

/// Tuning knobs for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Recurring job interval
    pub sync_interval: Duration,
    /// Retry ceiling per record
    pub max_attempts: i64,
    /// Age threshold for cleaning up delivered records
    pub days_to_keep: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(15 * 60),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            days_to_keep: DEFAULT_DAYS_TO_KEEP,
        }
    }
}

struct RecurringJob {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Public façade over the sync engine
pub struct SyncCoordinator {
    repository: SyncRepository,
    executor: Arc<SyncExecutor>,
    gate: Arc<dyn SyncGate>,
    connectivity: Arc<ConnectivityMonitor>,
    config: SyncConfig,
    flight: Arc<SingleFlight>,
    job: Mutex<Option<RecurringJob>>,
}

impl SyncCoordinator {
    pub fn new(
        database: Database,
        connectivity: Arc<ConnectivityMonitor>,
        gate: Arc<dyn SyncGate>,
        remote: Arc<dyn RemoteSyncApi>,
        config: SyncConfig,
    ) -> Self {
        let repository = SyncRepository::new(database);
        let executor = Arc::new(SyncExecutor::new(
            repository.clone(),
            Arc::clone(&connectivity),
            Arc::clone(&gate),
            remote,
            config.max_attempts,
            config.days_to_keep,
        ));
        Self {
            repository,
            executor,
            gate,
            connectivity,
            config,
            flight: Arc::new(SingleFlight::new()),
            job: Mutex::new(None),
        }
    }

    /// Called once at process start; schedules the recurring job only if
    /// the gate is currently open.
    pub fn initialize(&self) {
        if self.gate.is_open() {
            self.enable_sync();
        } else {
            tracing::info!("sync gate closed at startup, recurring job not scheduled");
        }
    }

    /// Queue a vocabulary word mutation
    pub async fn queue_word_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        word: WordPayload,
    ) -> Result<Option<i64>> {
        self.queue_sync(action, entity_id, SyncPayload::Word(word), priority::WORD)
            .await
    }

    /// Queue a quiz statistics mutation
    pub async fn queue_statistic_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        statistic: StatisticPayload,
    ) -> Result<Option<i64>> {
        self.queue_sync(
            action,
            entity_id,
            SyncPayload::Statistic(statistic),
            priority::STATISTIC,
        )
        .await
    }

    /// Queue an exam result mutation
    pub async fn queue_exam_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        exam: ExamPayload,
    ) -> Result<Option<i64>> {
        self.queue_sync(action, entity_id, SyncPayload::Exam(exam), priority::EXAM)
            .await
    }

    /// Queue an achievement unlock
    pub async fn queue_achievement_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        achievement: AchievementPayload,
    ) -> Result<Option<i64>> {
        self.queue_sync(
            action,
            entity_id,
            SyncPayload::Achievement(achievement),
            priority::ACHIEVEMENT,
        )
        .await
    }

    /// Queue a user profile mutation
    pub async fn queue_profile_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        profile: ProfilePayload,
    ) -> Result<Option<i64>> {
        self.queue_sync(
            action,
            entity_id,
            SyncPayload::UserProfile(profile),
            priority::USER_PROFILE,
        )
        .await
    }

    /// Queue any mutation with a caller-chosen priority.
    ///
    /// Returns `Ok(None)` without inserting when the gate is closed; the
    /// gate lives here, not in the repository, so direct repository
    /// callers can still enqueue.
    pub async fn queue_sync(
        &self,
        action: ActionType,
        entity_id: &str,
        payload: SyncPayload,
        priority: i64,
    ) -> Result<Option<i64>> {
        if !self.gate.is_open() {
            tracing::debug!(
                entity_type = %payload.entity_type(),
                entity_id,
                "sync gate closed, mutation not queued"
            );
            return Ok(None);
        }

        let id = self
            .repository
            .queue_action(action, entity_id, &payload, priority)
            .await?;
        self.trigger_sync_if_online();
        Ok(Some(id))
    }

    /// Request an immediate run if currently online.
    ///
    /// Deduplicated: a request while one is already waiting is dropped,
    /// not queued twice.
    pub fn trigger_sync_if_online(&self) {
        if !self.connectivity.is_currently_online() {
            return;
        }
        self.flight.request(RunRequest::immediate());
        self.kick();
    }

    /// Request an immediate run, replacing any waiting request
    pub fn force_sync(&self) {
        self.flight.request_replacing(RunRequest::forced());
        self.kick();
    }

    /// Idempotently start the recurring job
    pub fn enable_sync(&self) {
        let mut job = self.lock_job();
        if job.is_some() {
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let executor = Arc::clone(&self.executor);
        let flight = Arc::clone(&self.flight);
        let connectivity = Arc::clone(&self.connectivity);
        let period = self.config.sync_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        // Periodic runs carry a network-connected precondition
                        if connectivity.is_currently_online() {
                            flight.request(RunRequest::immediate());
                            drain(&executor, &flight).await;
                        }
                    }
                }
            }
            tracing::debug!("recurring sync job stopped");
        });

        *job = Some(RecurringJob { shutdown, handle });
        tracing::info!("recurring sync job scheduled");
    }

    /// Idempotently stop the recurring job.
    ///
    /// An in-flight run finishes rather than being interrupted, so no
    /// record is left in an ambiguous delivery state.
    pub async fn disable_sync(&self) {
        let job = self.lock_job().take();
        let Some(job) = job else { return };

        let _ = job.shutdown.send(true);
        if let Err(error) = job.handle.await {
            tracing::warn!("recurring sync job ended abnormally: {error}");
        }
        tracing::info!("recurring sync job cancelled");
    }

    /// Whether the recurring job is currently scheduled
    pub fn is_sync_scheduled(&self) -> bool {
        self.lock_job().is_some()
    }

    /// Run one sync pass and wait for its outcome.
    ///
    /// For hosts that drive sync by hand (e.g. the CLI). Callers mixing
    /// this with an enabled recurring job should prefer [`Self::force_sync`],
    /// which goes through the single-flight guard.
    pub async fn run_once(&self) -> SyncOutcome {
        self.executor.run().await
    }

    /// Live unsynced-record count for UI badges
    pub fn pending_count_watch(&self) -> watch::Receiver<u64> {
        self.repository.pending_count_watch()
    }

    /// Aggregate queue statistics
    pub async fn statistics(&self) -> Result<SyncStatistics> {
        self.repository.statistics(self.config.max_attempts).await
    }

    /// The repository underneath, for domain code that owns its records
    pub const fn repository(&self) -> &SyncRepository {
        &self.repository
    }

    /// Spawn a drain of the pending-request slot
    fn kick(&self) {
        let executor = Arc::clone(&self.executor);
        let flight = Arc::clone(&self.flight);
        tokio::spawn(async move {
            drain(&executor, &flight).await;
        });
    }

    fn lock_job(&self) -> std::sync::MutexGuard<'_, Option<RecurringJob>> {
        self.job
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Run the executor under the single-flight guard, one run per
/// coalesced request, until the slot stays empty.
async fn drain(executor: &SyncExecutor, flight: &SingleFlight) {
    loop {
        if !flight.try_begin() {
            // Another run is active; it will consume the pending slot
            return;
        }
        // Consume the request before running so the initiating request
        // is never served twice
        while flight.take().is_some() {
            executor.run().await;
        }
        flight.finish();
        // A request that slipped in between take() and finish() would
        // otherwise wait for the next tick
        if !flight.has_pending() {
            return;
        }
    }
}
