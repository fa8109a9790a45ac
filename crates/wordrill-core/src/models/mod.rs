//! Data models for the Wordrill sync engine

mod payload;
mod sync_record;

pub use payload::{
    AchievementPayload, BackupPayload, ExamPayload, FeatureFlagPayload, ProfilePayload,
    StatisticPayload, SyncPayload, WordPayload,
};
pub use sync_record::{
    priority, ActionType, EntityType, NewSyncRecord, SyncRecord, SyncStatistics,
};
