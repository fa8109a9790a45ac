//! Sync record model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of mutation to replay against the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

impl ActionType {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown action type: {other}")),
        }
    }
}

/// Domain kind a queued mutation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Word,
    Statistic,
    Exam,
    Achievement,
    UserProfile,
    Backup,
    FeatureFlag,
}

impl EntityType {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Statistic => "statistic",
            Self::Exam => "exam",
            Self::Achievement => "achievement",
            Self::UserProfile => "user_profile",
            Self::Backup => "backup",
            Self::FeatureFlag => "feature_flag",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(Self::Word),
            "statistic" => Ok(Self::Statistic),
            "exam" => Ok(Self::Exam),
            "achievement" => Ok(Self::Achievement),
            "user_profile" => Ok(Self::UserProfile),
            "backup" => Ok(Self::Backup),
            "feature_flag" => Ok(Self::FeatureFlag),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// Priority tiers assigned by the coordinator's typed enqueue methods.
///
/// Higher values drain first. Exam results and achievement unlocks outrank
/// ordinary word edits so the most valuable data reaches the server first.
pub mod priority {
    pub const WORD: i64 = 0;
    pub const STATISTIC: i64 = 1;
    pub const USER_PROFILE: i64 = 1;
    pub const EXAM: i64 = 2;
    pub const ACHIEVEMENT: i64 = 2;
}

/// A queued mutation destined for the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Store-assigned row id
    pub id: i64,
    /// Mutation kind to replay remotely
    pub action: ActionType,
    /// Domain kind of the affected entity
    pub entity_type: EntityType,
    /// Identifier of the affected entity (not unique across records)
    pub entity_id: String,
    /// JSON snapshot captured at enqueue time
    pub payload: String,
    /// Creation timestamp (Unix ms); secondary ordering key
    pub enqueued_at: i64,
    /// Terminal once true; flipped exactly once on confirmed delivery
    pub synced: bool,
    /// Failed dispatch count; sole retryable/failed discriminator
    pub attempt_count: i64,
    /// Most recent dispatch error, overwritten per failure
    pub last_error: Option<String>,
    /// Timestamp of the most recent dispatch attempt (Unix ms)
    pub last_attempt_at: Option<i64>,
    /// Higher drains first; caller-assigned at enqueue
    pub priority: i64,
}

impl SyncRecord {
    /// Whether this record is still eligible for automatic retry
    #[must_use]
    pub const fn is_retryable(&self, max_attempts: i64) -> bool {
        !self.synced && self.attempt_count < max_attempts
    }

    /// Whether this record has exhausted its retry budget
    #[must_use]
    pub const fn is_failed(&self, max_attempts: i64) -> bool {
        !self.synced && self.attempt_count >= max_attempts
    }
}

/// A record to insert; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncRecord {
    pub action: ActionType,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub payload: String,
    pub enqueued_at: i64,
    pub priority: i64,
}

impl NewSyncRecord {
    /// Build a record stamped with the current time
    #[must_use]
    pub fn new(
        action: ActionType,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        payload: impl Into<String>,
        priority: i64,
    ) -> Self {
        Self {
            action,
            entity_type,
            entity_id: entity_id.into(),
            payload: payload.into(),
            enqueued_at: chrono::Utc::now().timestamp_millis(),
            priority,
        }
    }
}

/// Aggregate queue statistics, recomputed on demand (never persisted)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncStatistics {
    /// All records currently in the queue
    pub total: u64,
    /// Unsynced records still within the retry budget
    pub pending: u64,
    /// Delivered records awaiting cleanup
    pub synced: u64,
    /// Unsynced records past the retry ceiling
    pub failed: u64,
    /// `synced / total`, or 0 for an empty queue
    pub success_rate: f64,
}

impl SyncStatistics {
    #[must_use]
    pub fn compute(total: u64, pending: u64, synced: u64, failed: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if total == 0 {
            0.0
        } else {
            synced as f64 / total as f64
        };
        Self {
            total,
            pending,
            synced,
            failed,
            success_rate,
        }
    }
}
