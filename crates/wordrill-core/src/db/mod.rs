//! Database layer for the Wordrill sync queue

mod connection;
mod migrations;
mod sync_store;

pub use connection::Database;
pub use sync_store::{SqliteSyncStore, SyncQueueStore};
