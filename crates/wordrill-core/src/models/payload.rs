//! Typed sync payloads
//!
//! Each queued mutation carries a snapshot of the entity serialized at
//! enqueue time. The snapshot is a copy: later edits to the live entity
//! never change an already-queued payload. The tagged union below keeps
//! the seven synced kinds exhaustive at compile time, so adding a kind
//! forces every dispatch site to handle it.

use serde::{Deserialize, Serialize};

use super::EntityType;

/// A vocabulary entry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPayload {
    pub term: String,
    pub translation: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// Per-quiz answer statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticPayload {
    pub quiz_kind: String,
    pub correct: u32,
    pub incorrect: u32,
    pub streak: u32,
}

/// A completed exam result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPayload {
    pub score: u32,
    pub total: u32,
    pub passed: bool,
    pub duration_secs: u64,
}

/// An unlocked achievement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementPayload {
    pub code: String,
    pub unlocked_at: i64,
}

/// User profile settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub display_name: String,
    pub daily_goal: u32,
    pub ui_language: String,
}

/// Reference to an uploaded backup snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPayload {
    pub snapshot_key: String,
    pub size_bytes: u64,
}

/// A client-side feature flag override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagPayload {
    pub flag: String,
    pub enabled: bool,
}

/// Tagged union over the seven synced entity kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncPayload {
    Word(WordPayload),
    Statistic(StatisticPayload),
    Exam(ExamPayload),
    Achievement(AchievementPayload),
    UserProfile(ProfilePayload),
    Backup(BackupPayload),
    FeatureFlag(FeatureFlagPayload),
}

impl SyncPayload {
    /// The entity kind this payload belongs to
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Word(_) => EntityType::Word,
            Self::Statistic(_) => EntityType::Statistic,
            Self::Exam(_) => EntityType::Exam,
            Self::Achievement(_) => EntityType::Achievement,
            Self::UserProfile(_) => EntityType::UserProfile,
            Self::Backup(_) => EntityType::Backup,
            Self::FeatureFlag(_) => EntityType::FeatureFlag,
        }
    }
}
