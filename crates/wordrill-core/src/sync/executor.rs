//! Sync executor
//!
//! The unit of work behind both the recurring job and on-demand runs:
//! drains retryable records in priority/time order, dispatches each to
//! its remote handler, updates bookkeeping, and triggers cleanup. One
//! record's failure never halts the batch, and nothing thrown inside a
//! run escapes to the scheduler.

use std::sync::Arc;

use crate::error::Result;
use crate::sync::connectivity::ConnectivityMonitor;
use crate::sync::gate::SyncGate;
use crate::sync::remote::RemoteSyncApi;
use crate::sync::repository::SyncRepository;

/// What a finished run reports back to the scheduling layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass finished; nothing left that a retry would help
    Completed,
    /// Dispatch was not possible or made no progress; back off and retry
    RetryLater,
}

/// Drains the durable queue against the remote handlers
pub struct SyncExecutor {
    repository: SyncRepository,
    connectivity: Arc<ConnectivityMonitor>,
    gate: Arc<dyn SyncGate>,
    remote: Arc<dyn RemoteSyncApi>,
    max_attempts: i64,
    days_to_keep: i64,
}

impl SyncExecutor {
    pub fn new(
        repository: SyncRepository,
        connectivity: Arc<ConnectivityMonitor>,
        gate: Arc<dyn SyncGate>,
        remote: Arc<dyn RemoteSyncApi>,
        max_attempts: i64,
        days_to_keep: i64,
    ) -> Self {
        Self {
            repository,
            connectivity,
            gate,
            remote,
            max_attempts,
            days_to_keep,
        }
    }

    /// Run one sync pass.
    ///
    /// Never propagates an error: internal failures are logged and
    /// reported as [`SyncOutcome::RetryLater`] so the host scheduler
    /// backs off instead of crashing.
    pub async fn run(&self) -> SyncOutcome {
        // Flag off: succeed immediately without touching the queue
        if !self.gate.is_sync_enabled() {
            tracing::debug!("sync feature flag disabled, skipping run");
            return SyncOutcome::Completed;
        }

        let outcome = match self.run_inner().await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!("sync run aborted: {error}");
                SyncOutcome::RetryLater
            }
        };

        // Best-effort trailing cleanup, regardless of the batch outcome
        if let Err(error) = self.repository.cleanup_old_synced(self.days_to_keep).await {
            tracing::warn!("queue cleanup failed: {error}");
        }

        outcome
    }

    async fn run_inner(&self) -> Result<SyncOutcome> {
        // Offline: no attempt was made, so no record gains a failure
        if !self.connectivity.is_currently_online() {
            tracing::debug!("offline, deferring sync run");
            return Ok(SyncOutcome::RetryLater);
        }

        let batch = self.repository.retryable_syncs(self.max_attempts).await?;
        if batch.is_empty() {
            return Ok(SyncOutcome::Completed);
        }

        let mut delivered = 0u32;
        let mut failures = 0u32;
        for record in &batch {
            let Some(payload) = self.repository.decode_payload(record) else {
                self.repository
                    .record_failed_attempt(record.id, "payload no longer decodes")
                    .await?;
                failures += 1;
                continue;
            };

            match self
                .remote
                .dispatch(record.action, &record.entity_id, &payload)
                .await
            {
                Ok(()) => {
                    self.repository.mark_synced(record.id).await?;
                    delivered += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        id = record.id,
                        entity_type = %record.entity_type,
                        attempt = record.attempt_count + 1,
                        "sync dispatch failed: {error}"
                    );
                    self.repository
                        .record_failed_attempt(record.id, &error.to_string())
                        .await?;
                    failures += 1;
                }
            }
        }

        tracing::info!(
            batch = batch.len(),
            delivered,
            failures,
            "sync pass finished"
        );

        // Progress counts as success; a fully failing batch asks for backoff
        if failures == 0 || delivered > 0 {
            Ok(SyncOutcome::Completed)
        } else {
            Ok(SyncOutcome::RetryLater)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{
        priority, ActionType, EntityType, ExamPayload, StatisticPayload, SyncPayload, WordPayload,
    };
    use crate::sync::connectivity::{NetworkStatus, Transport};
    use crate::sync::gate::StaticGate;
    use crate::sync::remote::test_support::ScriptedRemote;
    use crate::sync::repository::{DEFAULT_DAYS_TO_KEEP, DEFAULT_MAX_ATTEMPTS};

    fn online_monitor() -> Arc<ConnectivityMonitor> {
        Arc::new(ConnectivityMonitor::with_flap_window(
            NetworkStatus::online(Transport::Wifi),
            std::time::Duration::ZERO,
        ))
    }

    fn executor(
        repository: SyncRepository,
        connectivity: Arc<ConnectivityMonitor>,
        gate: Arc<StaticGate>,
        remote: Arc<ScriptedRemote>,
    ) -> SyncExecutor {
        SyncExecutor::new(
            repository,
            connectivity,
            gate,
            remote,
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_DAYS_TO_KEEP,
        )
    }

    fn word_payload(term: &str) -> SyncPayload {
        SyncPayload::Word(WordPayload {
            term: term.to_string(),
            translation: "house".to_string(),
            language: "de".to_string(),
            example: None,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_queue_completes() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let remote = Arc::new(ScriptedRemote::succeeding());
        let exec = executor(
            repo,
            online_monitor(),
            Arc::new(StaticGate::open()),
            Arc::clone(&remote),
        );

        assert_eq!(exec.run().await, SyncOutcome::Completed);
        assert!(remote.calls().is_empty());
    }

    // Scenario A: statistic (priority 1) then exam (priority 2); both
    // deliver, exam first, attempt counts stay zero.
    #[tokio::test(flavor = "multi_thread")]
    async fn drains_in_priority_order_and_marks_synced() {
        let repo = SyncRepository::open_in_memory().unwrap();
        repo.queue_action(
            ActionType::Update,
            "s-1",
            &SyncPayload::Statistic(StatisticPayload {
                quiz_kind: "flashcards".to_string(),
                correct: 8,
                incorrect: 2,
                streak: 3,
            }),
            priority::STATISTIC,
        )
        .await
        .unwrap();
        repo.queue_action(
            ActionType::Create,
            "e-1",
            &SyncPayload::Exam(ExamPayload {
                score: 18,
                total: 20,
                passed: true,
                duration_secs: 300,
            }),
            priority::EXAM,
        )
        .await
        .unwrap();

        let remote = Arc::new(ScriptedRemote::succeeding());
        let exec = executor(
            repo.clone(),
            online_monitor(),
            Arc::new(StaticGate::open()),
            Arc::clone(&remote),
        );

        assert_eq!(exec.run().await, SyncOutcome::Completed);

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, EntityType::Exam);
        assert_eq!(calls[1].1, EntityType::Statistic);

        assert_eq!(repo.pending_count().await.unwrap(), 0);
        let stats = repo.statistics(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        assert_eq!(stats.synced, 2);
        assert_eq!(stats.failed, 0);
    }

    // Scenario B: a permanently rejecting endpoint exhausts the retry
    // budget and the record moves from retryable to failed.
    #[tokio::test(flavor = "multi_thread")]
    async fn failing_record_ages_into_the_failed_set() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let id = repo
            .queue_action(ActionType::Update, "w-1", &word_payload("haus"), 0)
            .await
            .unwrap();

        let remote = Arc::new(ScriptedRemote::failing("http 422"));
        let exec = executor(
            repo.clone(),
            online_monitor(),
            Arc::new(StaticGate::open()),
            Arc::clone(&remote),
        );

        for _ in 0..5 {
            assert_eq!(exec.run().await, SyncOutcome::RetryLater);
        }
        // A sixth run finds nothing retryable and completes
        assert_eq!(exec.run().await, SyncOutcome::Completed);
        assert_eq!(remote.calls().len(), 5);

        let failed = repo.failed_syncs(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert_eq!(failed[0].attempt_count, 5);
        assert!(!failed[0].synced);
        assert_eq!(failed[0].last_error.as_deref(), Some("Remote service rejected the mutation: http 422"));
        assert!(repo
            .retryable_syncs(DEFAULT_MAX_ATTEMPTS)
            .await
            .unwrap()
            .is_empty());
    }

    // Scenario C: offline runs make no attempts and ask for a retry.
    #[tokio::test(flavor = "multi_thread")]
    async fn offline_run_defers_without_bookkeeping() {
        let repo = SyncRepository::open_in_memory().unwrap();
        repo.queue_action(ActionType::Update, "w-1", &word_payload("haus"), 0)
            .await
            .unwrap();

        let offline = Arc::new(ConnectivityMonitor::with_flap_window(
            NetworkStatus::OFFLINE,
            std::time::Duration::ZERO,
        ));
        let remote = Arc::new(ScriptedRemote::succeeding());
        let exec = executor(
            repo.clone(),
            offline,
            Arc::new(StaticGate::open()),
            Arc::clone(&remote),
        );

        assert_eq!(exec.run().await, SyncOutcome::RetryLater);
        assert!(remote.calls().is_empty());

        let pending = repo.pending_syncs().await.unwrap();
        assert_eq!(pending[0].attempt_count, 0);
        assert_eq!(pending[0].last_attempt_at, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_flag_completes_without_touching_the_queue() {
        let repo = SyncRepository::open_in_memory().unwrap();
        repo.queue_action(ActionType::Update, "w-1", &word_payload("haus"), 0)
            .await
            .unwrap();

        let gate = Arc::new(StaticGate::open());
        gate.set_sync_enabled(false);
        let remote = Arc::new(ScriptedRemote::succeeding());
        let exec = executor(
            repo.clone(),
            online_monitor(),
            gate,
            Arc::clone(&remote),
        );

        assert_eq!(exec.run().await, SyncOutcome::Completed);
        assert!(remote.calls().is_empty());
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_bad_record_does_not_halt_the_batch() {
        let repo = SyncRepository::open_in_memory().unwrap();

        // Corrupt the first record's payload behind the repository's back
        let corrupt = repo
            .queue_action(ActionType::Update, "w-1", &word_payload("haus"), 2)
            .await
            .unwrap();
        repo.queue_action(ActionType::Update, "w-2", &word_payload("baum"), 1)
            .await
            .unwrap();
        repo.overwrite_payload_for_tests(corrupt, "{broken").await;

        let remote = Arc::new(ScriptedRemote::succeeding());
        let exec = executor(
            repo.clone(),
            online_monitor(),
            Arc::new(StaticGate::open()),
            Arc::clone(&remote),
        );

        // Progress on the healthy record still counts as a completed pass
        assert_eq!(exec.run().await, SyncOutcome::Completed);
        assert_eq!(remote.calls().len(), 1);
        assert_eq!(remote.calls()[0].2, "w-2");

        let pending = repo.pending_syncs().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, corrupt);
        assert_eq!(pending[0].attempt_count, 1);
        assert_eq!(
            pending[0].last_error.as_deref(),
            Some("payload no longer decodes")
        );

        let synced = repo.statistics(DEFAULT_MAX_ATTEMPTS).await.unwrap().synced;
        assert_eq!(synced, 1);
    }
}
