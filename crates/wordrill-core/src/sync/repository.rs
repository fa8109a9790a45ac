//! Sync repository
//!
//! Queue semantics over the durable store: enqueue, drain-order fetches,
//! delivery bookkeeping, cleanup, and aggregate statistics. Every method
//! isolates its own failures so one bad record never blocks the rest of
//! the queue.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::db::{Database, SqliteSyncStore, SyncQueueStore};
use crate::error::Result;
use crate::models::{
    ActionType, NewSyncRecord, SyncPayload, SyncRecord, SyncStatistics,
};

/// Retry ceiling after which a record is considered permanently failed
pub const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// How long delivered records are kept before cleanup removes them
pub const DEFAULT_DAYS_TO_KEEP: i64 = 7;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Thread-safe repository over the durable sync queue
#[derive(Clone)]
pub struct SyncRepository {
    db: Arc<Mutex<Database>>,
    pending_count: Arc<watch::Sender<u64>>,
}

impl SyncRepository {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        let initial = {
            let store = SqliteSyncStore::new(db.connection());
            store.count_unsynced().unwrap_or(0)
        };
        let (pending_count, _) = watch::channel(initial);
        Self {
            db: Arc::new(Mutex::new(db)),
            pending_count: Arc::new(pending_count),
        }
    }

    /// Open a repository over an in-memory database (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Serialize a payload snapshot and persist a queue record.
    ///
    /// Fails only on serialization or storage errors; the caller's
    /// mutation is simply not queued in that case.
    pub async fn queue_action(
        &self,
        action: ActionType,
        entity_id: &str,
        payload: &SyncPayload,
        priority: i64,
    ) -> Result<i64> {
        let snapshot = serde_json::to_string(payload)?;
        let record = NewSyncRecord::new(
            action,
            payload.entity_type(),
            entity_id,
            snapshot,
            priority,
        );

        let db = self.db.lock().await;
        let store = SqliteSyncStore::new(db.connection());
        let id = store.insert(&record)?;
        self.refresh_pending_count(&store);

        tracing::debug!(
            id,
            entity_type = %record.entity_type,
            entity_id,
            priority,
            "queued {action} for sync"
        );
        Ok(id)
    }

    /// Enqueue several mutations atomically (all-or-nothing)
    pub async fn queue_all(
        &self,
        actions: Vec<(ActionType, String, SyncPayload, i64)>,
    ) -> Result<Vec<i64>> {
        let mut records = Vec::with_capacity(actions.len());
        for (action, entity_id, payload, priority) in &actions {
            let snapshot = serde_json::to_string(payload)?;
            records.push(NewSyncRecord::new(
                *action,
                payload.entity_type(),
                entity_id.clone(),
                snapshot,
                *priority,
            ));
        }

        let db = self.db.lock().await;
        let store = SqliteSyncStore::new(db.connection());
        let ids = store.insert_all(&records)?;
        self.refresh_pending_count(&store);
        Ok(ids)
    }

    /// All unsynced records in drain order
    pub async fn pending_syncs(&self) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        SqliteSyncStore::new(db.connection()).pending()
    }

    /// Current number of unsynced records
    pub async fn pending_count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        SqliteSyncStore::new(db.connection()).count_unsynced()
    }

    /// Live unsynced-record count for UI badges
    pub fn pending_count_watch(&self) -> watch::Receiver<u64> {
        self.pending_count.subscribe()
    }

    /// Flag a record as delivered; idempotent, never reverts
    pub async fn mark_synced(&self, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        let store = SqliteSyncStore::new(db.connection());
        store.mark_synced(id)?;
        self.refresh_pending_count(&store);
        Ok(())
    }

    /// Record a failed dispatch attempt, stamped with the current time
    pub async fn record_failed_attempt(&self, id: i64, message: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let db = self.db.lock().await;
        SqliteSyncStore::new(db.connection()).record_failure(id, now, message)
    }

    /// Unsynced records still within the retry budget, in drain order
    pub async fn retryable_syncs(&self, max_attempts: i64) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        SqliteSyncStore::new(db.connection()).retryable(max_attempts)
    }

    /// Unsynced records past the retry ceiling, kept for diagnostics
    pub async fn failed_syncs(&self, max_attempts: i64) -> Result<Vec<SyncRecord>> {
        let db = self.db.lock().await;
        SqliteSyncStore::new(db.connection()).failed(max_attempts)
    }

    /// Delete synced records older than `days_to_keep`; returns the number deleted
    pub async fn cleanup_old_synced(&self, days_to_keep: i64) -> Result<usize> {
        let cutoff = chrono::Utc::now().timestamp_millis() - days_to_keep * MILLIS_PER_DAY;
        let db = self.db.lock().await;
        let deleted = SqliteSyncStore::new(db.connection()).delete_synced_before(cutoff)?;
        if deleted > 0 {
            tracing::debug!(deleted, "cleaned up old synced records");
        }
        Ok(deleted)
    }

    /// Aggregate queue statistics, recomputed from the store
    pub async fn statistics(&self, max_attempts: i64) -> Result<SyncStatistics> {
        let db = self.db.lock().await;
        let store = SqliteSyncStore::new(db.connection());
        let total = store.count_all()?;
        let synced = store.count_synced()?;
        let unsynced = store.count_unsynced()?;
        let failed = store.count_failed(max_attempts)?;
        Ok(SyncStatistics::compute(
            total,
            unsynced.saturating_sub(failed),
            synced,
            failed,
        ))
    }

    /// Decode a record's payload snapshot.
    ///
    /// Returns `None` on malformed payloads instead of an error, so one
    /// corrupt record cannot abort a batch.
    pub fn decode_payload(&self, record: &SyncRecord) -> Option<SyncPayload> {
        match serde_json::from_str(&record.payload) {
            Ok(payload) => Some(payload),
            Err(error) => {
                tracing::warn!(id = record.id, "sync payload no longer decodes: {error}");
                None
            }
        }
    }

    /// Remove every record regardless of state; returns the number deleted
    pub async fn clear_all(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let store = SqliteSyncStore::new(db.connection());
        let deleted = store.clear()?;
        self.refresh_pending_count(&store);
        Ok(deleted)
    }

    /// Damage a stored payload in place, simulating on-disk corruption
    #[cfg(test)]
    pub(crate) async fn overwrite_payload_for_tests(&self, id: i64, payload: &str) {
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "UPDATE sync_queue SET payload = ? WHERE id = ?",
                rusqlite::params![payload, id],
            )
            .unwrap();
    }

    fn refresh_pending_count(&self, store: &SqliteSyncStore<'_>) {
        if let Ok(count) = store.count_unsynced() {
            self.pending_count.send_if_modified(|current| {
                if *current == count {
                    false
                } else {
                    *current = count;
                    true
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{EntityType, StatisticPayload, WordPayload};

    fn word_payload() -> SyncPayload {
        SyncPayload::Word(WordPayload {
            term: "haus".to_string(),
            translation: "house".to_string(),
            language: "de".to_string(),
            example: None,
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_action_persists_a_snapshot() {
        let repo = SyncRepository::open_in_memory().unwrap();

        let id = repo
            .queue_action(ActionType::Update, "w-1", &word_payload(), 0)
            .await
            .unwrap();

        let pending = repo.pending_syncs().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].entity_type, EntityType::Word);

        let decoded = repo.decode_payload(&pending[0]).unwrap();
        assert_eq!(decoded, word_payload());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_payload_is_a_copy_not_a_reference() {
        let repo = SyncRepository::open_in_memory().unwrap();

        let mut payload = WordPayload {
            term: "haus".to_string(),
            translation: "house".to_string(),
            language: "de".to_string(),
            example: None,
        };
        repo.queue_action(
            ActionType::Update,
            "w-1",
            &SyncPayload::Word(payload.clone()),
            0,
        )
        .await
        .unwrap();

        // Mutating the live entity after enqueue must not change the snapshot
        payload.translation = "building".to_string();

        let pending = repo.pending_syncs().await.unwrap();
        let SyncPayload::Word(snapshot) = repo.decode_payload(&pending[0]).unwrap() else {
            panic!("expected word payload");
        };
        assert_eq!(snapshot.translation, "house");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_all_inserts_every_record() {
        let repo = SyncRepository::open_in_memory().unwrap();

        let stat = SyncPayload::Statistic(StatisticPayload {
            quiz_kind: "flashcards".to_string(),
            correct: 9,
            incorrect: 1,
            streak: 4,
        });
        let ids = repo
            .queue_all(vec![
                (ActionType::Create, "w-1".to_string(), word_payload(), 0),
                (ActionType::Update, "s-1".to_string(), stat, 1),
            ])
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(repo.pending_count().await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_count_tracks_enqueues_syncs_and_deletes() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let watch = repo.pending_count_watch();
        assert_eq!(*watch.borrow(), 0);

        let a = repo
            .queue_action(ActionType::Create, "w-1", &word_payload(), 0)
            .await
            .unwrap();
        repo.queue_action(ActionType::Update, "w-2", &word_payload(), 0)
            .await
            .unwrap();
        assert_eq!(*watch.borrow(), 2);

        repo.mark_synced(a).await.unwrap();
        assert_eq!(*watch.borrow(), 1);
        assert_eq!(repo.pending_count().await.unwrap(), 1);

        repo.clear_all().await.unwrap();
        assert_eq!(*watch.borrow(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_twice_leaves_bookkeeping_unchanged() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let id = repo
            .queue_action(ActionType::Create, "w-1", &word_payload(), 0)
            .await
            .unwrap();

        repo.mark_synced(id).await.unwrap();
        repo.mark_synced(id).await.unwrap();

        let stats = repo.statistics(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        assert_eq!(stats.synced, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn record_failed_attempt_stamps_time_and_error() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let id = repo
            .queue_action(ActionType::Delete, "w-1", &word_payload(), 0)
            .await
            .unwrap();

        repo.record_failed_attempt(id, "connection reset").await.unwrap();

        let pending = repo.pending_syncs().await.unwrap();
        assert_eq!(pending[0].attempt_count, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("connection reset"));
        assert!(pending[0].last_attempt_at.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retryable_and_failed_never_overlap() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let exhausted = repo
            .queue_action(ActionType::Update, "w-1", &word_payload(), 0)
            .await
            .unwrap();
        let fresh = repo
            .queue_action(ActionType::Update, "w-2", &word_payload(), 0)
            .await
            .unwrap();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            repo.record_failed_attempt(exhausted, "rejected").await.unwrap();
        }

        let retryable = repo.retryable_syncs(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        let failed = repo.failed_syncs(DEFAULT_MAX_ATTEMPTS).await.unwrap();

        assert_eq!(retryable.iter().map(|r| r.id).collect::<Vec<_>>(), vec![fresh]);
        assert_eq!(failed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![exhausted]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn decode_payload_tolerates_corrupt_rows() {
        let repo = SyncRepository::open_in_memory().unwrap();
        let id = repo
            .queue_action(ActionType::Create, "w-1", &word_payload(), 0)
            .await
            .unwrap();

        let mut record = repo.pending_syncs().await.unwrap().remove(0);
        assert_eq!(record.id, id);
        record.payload = "{not valid".to_string();

        assert!(repo.decode_payload(&record).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn statistics_partition_the_queue() {
        let repo = SyncRepository::open_in_memory().unwrap();

        let synced = repo
            .queue_action(ActionType::Create, "a", &word_payload(), 0)
            .await
            .unwrap();
        repo.queue_action(ActionType::Create, "b", &word_payload(), 0)
            .await
            .unwrap();
        let failed = repo
            .queue_action(ActionType::Create, "c", &word_payload(), 0)
            .await
            .unwrap();
        repo.mark_synced(synced).await.unwrap();
        for _ in 0..DEFAULT_MAX_ATTEMPTS {
            repo.record_failed_attempt(failed, "rejected").await.unwrap();
        }

        let stats = repo.statistics(DEFAULT_MAX_ATTEMPTS).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.synced, 1);
        assert_eq!(stats.failed, 1);
        assert!((stats.success_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cleanup_keeps_recent_and_unsynced_records() {
        let repo = SyncRepository::open_in_memory().unwrap();

        let recent_synced = repo
            .queue_action(ActionType::Create, "a", &word_payload(), 0)
            .await
            .unwrap();
        repo.queue_action(ActionType::Create, "b", &word_payload(), 0)
            .await
            .unwrap();
        repo.mark_synced(recent_synced).await.unwrap();

        // Everything was enqueued just now, so a 7-day cutoff deletes nothing
        let deleted = repo.cleanup_old_synced(DEFAULT_DAYS_TO_KEEP).await.unwrap();
        assert_eq!(deleted, 0);

        // A cutoff in the future removes the synced record but not the pending one
        let deleted = repo.cleanup_old_synced(-1).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.pending_count().await.unwrap(), 1);
    }
}
