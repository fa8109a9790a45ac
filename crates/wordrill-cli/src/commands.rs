//! Command implementations over the core sync engine

use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use wordrill_core::db::Database;
use wordrill_core::sync::{
    ConnectivityMonitor, LoggingRemoteApi, NetworkStatus, StaticGate, SyncConfig, SyncCoordinator,
    SyncOutcome, Transport, DEFAULT_MAX_ATTEMPTS,
};
use wordrill_core::SyncRecord;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct QueueItem {
    pub id: i64,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub priority: i64,
    pub attempts: i64,
    pub enqueued_at: String,
    pub last_error: Option<String>,
}

impl From<&SyncRecord> for QueueItem {
    fn from(record: &SyncRecord) -> Self {
        Self {
            id: record.id,
            action: record.action.to_string(),
            entity_type: record.entity_type.to_string(),
            entity_id: record.entity_id.clone(),
            priority: record.priority,
            attempts: record.attempt_count,
            enqueued_at: format_timestamp(record.enqueued_at),
            last_error: record.last_error.clone(),
        }
    }
}

pub async fn status(db_path: &Path, json: bool) -> Result<(), CliError> {
    let coordinator = open_coordinator(db_path)?;
    let stats = coordinator.statistics().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("total:        {}", stats.total);
        println!("pending:      {}", stats.pending);
        println!("synced:       {}", stats.synced);
        println!("failed:       {}", stats.failed);
        println!("success rate: {:.1}%", stats.success_rate * 100.0);
    }
    Ok(())
}

pub async fn pending(db_path: &Path, limit: usize, json: bool) -> Result<(), CliError> {
    let coordinator = open_coordinator(db_path)?;
    let records = coordinator.repository().pending_syncs().await?;
    let items: Vec<QueueItem> = records.iter().take(limit).map(QueueItem::from).collect();

    print_items(&items, json, "queue is empty")
}

pub async fn failed(db_path: &Path, json: bool) -> Result<(), CliError> {
    let coordinator = open_coordinator(db_path)?;
    let records = coordinator
        .repository()
        .failed_syncs(DEFAULT_MAX_ATTEMPTS)
        .await?;
    let items: Vec<QueueItem> = records.iter().map(QueueItem::from).collect();

    print_items(&items, json, "no permanently failed records")
}

pub async fn sync(db_path: &Path) -> Result<(), CliError> {
    let coordinator = open_coordinator(db_path)?;
    match coordinator.run_once().await {
        SyncOutcome::Completed => println!("Sync pass completed"),
        SyncOutcome::RetryLater => println!("Sync pass made no progress; retry later"),
    }
    Ok(())
}

pub async fn cleanup(db_path: &Path, days: i64) -> Result<(), CliError> {
    let coordinator = open_coordinator(db_path)?;
    let deleted = coordinator.repository().cleanup_old_synced(days).await?;
    println!("Deleted {deleted} synced record(s) older than {days} day(s)");
    Ok(())
}

pub async fn clear(db_path: &Path, yes: bool) -> Result<(), CliError> {
    if !yes {
        return Err(CliError::ClearNotConfirmed);
    }
    let coordinator = open_coordinator(db_path)?;
    let deleted = coordinator.repository().clear_all().await?;
    println!("Removed {deleted} record(s)");
    Ok(())
}

/// CLI invocations are explicit user actions, so the gate is open and
/// the connection is assumed reachable; the remote handlers are the
/// logging stubs until a live backend lands.
fn open_coordinator(db_path: &Path) -> Result<SyncCoordinator, CliError> {
    let database = Database::open(db_path)?;
    let connectivity = Arc::new(ConnectivityMonitor::new(NetworkStatus::online(
        Transport::Other,
    )));
    Ok(SyncCoordinator::new(
        database,
        connectivity,
        Arc::new(StaticGate::open()),
        Arc::new(LoggingRemoteApi),
        SyncConfig::default(),
    ))
}

fn print_items(items: &[QueueItem], json: bool, empty_message: &str) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }

    for item in items {
        let error = item
            .last_error
            .as_deref()
            .map(|e| format!("  last error: {e}"))
            .unwrap_or_default();
        println!(
            "#{:<5} {:<6} {:<12} {:<24} prio {}  attempts {}  {}{}",
            item.id,
            item.action,
            item.entity_type,
            item.entity_id,
            item.priority,
            item.attempts,
            item.enqueued_at,
            error
        );
    }
    Ok(())
}

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |dt| dt.to_rfc3339())
}
