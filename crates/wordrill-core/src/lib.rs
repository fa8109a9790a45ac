//! wordrill-core - Core library for Wordrill sync
//!
//! This crate contains the shared models, the durable queue database
//! layer, and the offline-first sync engine used by all Wordrill
//! surfaces (mobile app, CLI).

pub mod db;
pub mod error;
pub mod models;
pub mod sync;

pub use error::{Error, Result};
pub use models::{ActionType, EntityType, SyncPayload, SyncRecord, SyncStatistics};
