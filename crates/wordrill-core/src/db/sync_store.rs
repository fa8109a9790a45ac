//! Durable queue store
//!
//! Narrow persistence primitives over the `sync_queue` table. No retry
//! logic or queue policy lives here; that belongs to the repository and
//! executor layers.

use rusqlite::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{EntityType, NewSyncRecord, SyncRecord};

const RECORD_COLUMNS: &str = "id, action_type, entity_type, entity_id, payload, \
     enqueued_at, synced, attempt_count, last_error, last_attempt_at, priority";

/// Trait for sync queue storage operations
pub trait SyncQueueStore {
    /// Insert a record; returns the store-assigned id
    fn insert(&self, record: &NewSyncRecord) -> Result<i64>;

    /// Insert several records atomically (all-or-nothing)
    fn insert_all(&self, records: &[NewSyncRecord]) -> Result<Vec<i64>>;

    /// Get a record by id
    fn get(&self, id: i64) -> Result<Option<SyncRecord>>;

    /// All unsynced records, highest priority first, FIFO within a tier
    fn pending(&self) -> Result<Vec<SyncRecord>>;

    /// Unsynced records of one entity kind, in drain order
    fn pending_for_entity_type(&self, entity_type: EntityType) -> Result<Vec<SyncRecord>>;

    /// Unsynced records for one entity, in drain order
    fn pending_for_entity(&self, entity_id: &str) -> Result<Vec<SyncRecord>>;

    /// Unsynced records below the attempt ceiling, in drain order
    fn retryable(&self, max_attempts: i64) -> Result<Vec<SyncRecord>>;

    /// Unsynced records at or past the attempt ceiling
    fn failed(&self, max_attempts: i64) -> Result<Vec<SyncRecord>>;

    /// Flip the synced flag; idempotent, never reverts
    fn mark_synced(&self, id: i64) -> Result<()>;

    /// Atomically increment the attempt count and overwrite the error fields
    fn record_failure(&self, id: i64, at: i64, error: &str) -> Result<()>;

    /// Delete a single record
    fn delete(&self, id: i64) -> Result<()>;

    /// Delete every synced record; returns the number deleted
    fn delete_all_synced(&self) -> Result<usize>;

    /// Delete synced records enqueued before the cutoff; returns the number deleted
    fn delete_synced_before(&self, cutoff: i64) -> Result<usize>;

    /// Total records in the queue
    fn count_all(&self) -> Result<u64>;

    /// Records not yet delivered
    fn count_unsynced(&self) -> Result<u64>;

    /// Records delivered and awaiting cleanup
    fn count_synced(&self) -> Result<u64>;

    /// Unsynced records past the attempt ceiling
    fn count_failed(&self, max_attempts: i64) -> Result<u64>;

    /// Remove every record regardless of state
    fn clear(&self) -> Result<usize>;
}

/// `SQLite` implementation of `SyncQueueStore`
pub struct SqliteSyncStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a sync record from a database row
    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncRecord> {
        let action: String = row.get(1)?;
        let entity_type: String = row.get(2)?;
        Ok(SyncRecord {
            id: row.get(0)?,
            action: action.parse().map_err(|message: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    1,
                    rusqlite::types::Type::Text,
                    message.into(),
                )
            })?,
            entity_type: entity_type.parse().map_err(|message: String| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    message.into(),
                )
            })?,
            entity_id: row.get(3)?,
            payload: row.get(4)?,
            enqueued_at: row.get(5)?,
            synced: row.get::<_, i32>(6)? != 0,
            attempt_count: row.get(7)?,
            last_error: row.get(8)?,
            last_attempt_at: row.get(9)?,
            priority: row.get(10)?,
        })
    }

    fn insert_with(conn: &Connection, record: &NewSyncRecord) -> Result<i64> {
        conn.execute(
            "INSERT INTO sync_queue
             (action_type, entity_type, entity_id, payload, enqueued_at, priority)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.action.as_str(),
                record.entity_type.as_str(),
                record.entity_id,
                record.payload,
                record.enqueued_at,
                record.priority
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn query_records(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SyncRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn count(&self, sql: &str, params: impl rusqlite::Params) -> Result<u64> {
        let count: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

impl SyncQueueStore for SqliteSyncStore<'_> {
    fn insert(&self, record: &NewSyncRecord) -> Result<i64> {
        Self::insert_with(self.conn, record)
    }

    fn insert_all(&self, records: &[NewSyncRecord]) -> Result<Vec<i64>> {
        // unchecked_transaction: the connection is behind an exclusive
        // lock at the repository layer, never shared across threads here
        let tx = self.conn.unchecked_transaction()?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(Self::insert_with(&tx, record)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn get(&self, id: i64) -> Result<Option<SyncRecord>> {
        let result = self.conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM sync_queue WHERE id = ?"),
            params![id],
            Self::parse_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn pending(&self) -> Result<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM sync_queue
                 WHERE synced = 0
                 ORDER BY priority DESC, enqueued_at ASC"
            ),
            [],
        )
    }

    fn pending_for_entity_type(&self, entity_type: EntityType) -> Result<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM sync_queue
                 WHERE synced = 0 AND entity_type = ?
                 ORDER BY priority DESC, enqueued_at ASC"
            ),
            params![entity_type.as_str()],
        )
    }

    fn pending_for_entity(&self, entity_id: &str) -> Result<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM sync_queue
                 WHERE synced = 0 AND entity_id = ?
                 ORDER BY priority DESC, enqueued_at ASC"
            ),
            params![entity_id],
        )
    }

    fn retryable(&self, max_attempts: i64) -> Result<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM sync_queue
                 WHERE synced = 0 AND attempt_count < ?
                 ORDER BY priority DESC, enqueued_at ASC"
            ),
            params![max_attempts],
        )
    }

    fn failed(&self, max_attempts: i64) -> Result<Vec<SyncRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM sync_queue
                 WHERE synced = 0 AND attempt_count >= ?
                 ORDER BY priority DESC, enqueued_at ASC"
            ),
            params![max_attempts],
        )
    }

    fn mark_synced(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("UPDATE sync_queue SET synced = 1 WHERE id = ?", params![id])?;

        if rows == 0 && self.get(id)?.is_none() {
            return Err(Error::NotFound(id));
        }

        Ok(())
    }

    fn record_failure(&self, id: i64, at: i64, error: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET attempt_count = attempt_count + 1,
                 last_error = ?,
                 last_attempt_at = ?
             WHERE id = ?",
            params![error, at, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        Ok(())
    }

    fn delete(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id])?;

        if rows == 0 {
            return Err(Error::NotFound(id));
        }

        Ok(())
    }

    fn delete_all_synced(&self) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM sync_queue WHERE synced = 1", [])?)
    }

    fn delete_synced_before(&self, cutoff: i64) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM sync_queue WHERE synced = 1 AND enqueued_at < ?",
            params![cutoff],
        )?)
    }

    fn count_all(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM sync_queue", [])
    }

    fn count_unsynced(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM sync_queue WHERE synced = 0", [])
    }

    fn count_synced(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM sync_queue WHERE synced = 1", [])
    }

    fn count_failed(&self, max_attempts: i64) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM sync_queue WHERE synced = 0 AND attempt_count >= ?",
            params![max_attempts],
        )
    }

    fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM sync_queue", [])?)
    }
}
