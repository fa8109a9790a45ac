//! Remote delivery seam
//!
//! Per-entity-type endpoints accepting one mutation each. The engine's
//! retry, priority, and cleanup machinery is exercised against whatever
//! implementation the host provides; [`LoggingRemoteApi`] is the
//! logging no-op stub used until a live backend lands.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{
    AchievementPayload, ActionType, BackupPayload, ExamPayload, FeatureFlagPayload,
    ProfilePayload, StatisticPayload, SyncPayload, WordPayload,
};

/// Errors surfaced by a remote handler
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The mutation never reached the service
    #[error("Remote transport error: {0}")]
    Transport(String),

    /// The service received and rejected the mutation
    #[error("Remote service rejected the mutation: {0}")]
    Rejected(String),
}

/// Boxed dispatch future, so implementations stay object-safe
pub type RemoteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), RemoteError>> + Send + 'a>>;

/// Per-entity-type remote endpoints
pub trait RemoteSyncApi: Send + Sync {
    fn sync_word<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        word: &'a WordPayload,
    ) -> RemoteFuture<'a>;

    fn sync_statistic<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        statistic: &'a StatisticPayload,
    ) -> RemoteFuture<'a>;

    fn sync_exam<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        exam: &'a ExamPayload,
    ) -> RemoteFuture<'a>;

    fn sync_achievement<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        achievement: &'a AchievementPayload,
    ) -> RemoteFuture<'a>;

    fn sync_profile<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        profile: &'a ProfilePayload,
    ) -> RemoteFuture<'a>;

    fn sync_backup<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        backup: &'a BackupPayload,
    ) -> RemoteFuture<'a>;

    fn sync_feature_flag<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        flag: &'a FeatureFlagPayload,
    ) -> RemoteFuture<'a>;

    /// Route one mutation to its per-entity-type endpoint
    fn dispatch<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        payload: &'a SyncPayload,
    ) -> RemoteFuture<'a> {
        match payload {
            SyncPayload::Word(word) => self.sync_word(action, entity_id, word),
            SyncPayload::Statistic(statistic) => self.sync_statistic(action, entity_id, statistic),
            SyncPayload::Exam(exam) => self.sync_exam(action, entity_id, exam),
            SyncPayload::Achievement(achievement) => {
                self.sync_achievement(action, entity_id, achievement)
            }
            SyncPayload::UserProfile(profile) => self.sync_profile(action, entity_id, profile),
            SyncPayload::Backup(backup) => self.sync_backup(action, entity_id, backup),
            SyncPayload::FeatureFlag(flag) => self.sync_feature_flag(action, entity_id, flag),
        }
    }
}

/// Logging no-op handlers, pending a live backend
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRemoteApi;

impl LoggingRemoteApi {
    fn accept(kind: &str, action: ActionType, entity_id: &str) -> RemoteFuture<'static> {
        tracing::debug!(entity_id, "{kind} sync stub accepted {action}");
        Box::pin(std::future::ready(Ok(())))
    }
}

impl RemoteSyncApi for LoggingRemoteApi {
    fn sync_word<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _word: &'a WordPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("word", action, entity_id)
    }

    fn sync_statistic<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _statistic: &'a StatisticPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("statistic", action, entity_id)
    }

    fn sync_exam<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _exam: &'a ExamPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("exam", action, entity_id)
    }

    fn sync_achievement<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _achievement: &'a AchievementPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("achievement", action, entity_id)
    }

    fn sync_profile<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _profile: &'a ProfilePayload,
    ) -> RemoteFuture<'a> {
        Self::accept("profile", action, entity_id)
    }

    fn sync_backup<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _backup: &'a BackupPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("backup", action, entity_id)
    }

    fn sync_feature_flag<'a>(
        &'a self,
        action: ActionType,
        entity_id: &'a str,
        _flag: &'a FeatureFlagPayload,
    ) -> RemoteFuture<'a> {
        Self::accept("feature flag", action, entity_id)
    }
}
