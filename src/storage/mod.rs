//! Persistence and cache layer
//!
//! The `EvidenceStore` trait abstracts the durable backend; `SqliteStore` is
//! the implementation. `Persistence` wraps a store with the in-memory
//! `EntityCache` and the fault-isolated write path.

mod cache;
mod persistence;
mod sqlite;
mod traits;

pub use cache::EntityCache;
pub use persistence::{Persistence, ADVISORY_HISTORY_LIMIT, CACHE_REBUILD_LIMIT};
pub use sqlite::SqliteStore;
pub use traits::{
    clamp_limit, EntityFilter, EntityPage, EntitySort, EvidenceStore, OpenStore, StorageError,
    StorageResult,
    DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
