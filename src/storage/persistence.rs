//! Fault-isolated write path and cache-first read path over an [`EvidenceStore`]

use super::cache::EntityCache;
use super::traits::{EntityFilter, EntityPage, EvidenceStore, StorageResult};
use crate::model::{AdvisorySession, AuditEvent, Entity, TrustHistoryPoint};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entities read back into the cache on startup.
pub const CACHE_REBUILD_LIMIT: usize = 5000;

/// Advisory sessions returned per entity.
pub const ADVISORY_HISTORY_LIMIT: usize = 200;

/// Owns the durable store and its in-memory projection.
///
/// Writes never fail the caller: an error is logged and reported as
/// `false`. The store remains the source of truth; the cache only mirrors
/// rows that were written or read successfully.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn EvidenceStore>,
    cache: Arc<EntityCache>,
}

impl Persistence {
    pub fn new(store: Arc<dyn EvidenceStore>) -> Self {
        Self {
            store,
            cache: Arc::new(EntityCache::new()),
        }
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    // === Write path ===

    pub fn record_entity(&self, entity: &Entity) -> bool {
        match self
            .cache
            .write_through(entity, |e| self.store.upsert_entity(e))
        {
            Ok(()) => true,
            Err(e) => {
                warn!(entity_id = %entity.entity_id, error = %e, "failed to persist entity");
                false
            }
        }
    }

    pub fn record_trust_point(&self, point: &TrustHistoryPoint) -> bool {
        self.store
            .append_trust_point(point)
            .map_err(|e| warn!(entity_id = %point.entity_id, error = %e, "failed to append trust point"))
            .is_ok()
    }

    /// True when a new audit row was written. A duplicate `event_id` is a
    /// no-op and also returns false.
    pub fn record_audit_event(&self, event: &AuditEvent) -> bool {
        match self.store.insert_audit_event(event) {
            Ok(inserted) => {
                if !inserted {
                    debug!(event_id = %event.event_id, "audit event already recorded");
                }
                inserted
            }
            Err(e) => {
                warn!(event_type = event.event_type.as_str(), error = %e, "failed to record audit event");
                false
            }
        }
    }

    pub fn record_advisory_session(&self, session: &AdvisorySession) -> bool {
        self.store
            .append_advisory_session(session)
            .map_err(|e| warn!(error = %e, "failed to append advisory session"))
            .is_ok()
    }

    // === Startup ===

    /// Load the most recent entities into the cache without overwriting
    /// entries already present. Returns the number inserted.
    pub fn rebuild_cache(&self) -> usize {
        let entities = match self.store.recent_entities(CACHE_REBUILD_LIMIT) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(error = %e, "cache rebuild failed");
                return 0;
            }
        };
        let inserted = entities
            .into_iter()
            .filter(|e| self.cache.insert_if_absent(e.clone()))
            .count();
        info!(inserted, cached = self.cache.len(), "entity cache rebuilt");
        inserted
    }

    // === Read path ===

    /// Cache first; on a miss read the store and populate the cache.
    pub fn entity(&self, entity_id: &str) -> StorageResult<Option<Entity>> {
        if let Some(entity) = self.cache.get(entity_id) {
            return Ok(Some(entity));
        }
        let loaded = self.store.load_entity(entity_id)?;
        if let Some(ref entity) = loaded {
            self.cache.insert_if_absent(entity.clone());
        }
        Ok(loaded)
    }

    pub fn list_entities(&self, filter: &EntityFilter) -> StorageResult<EntityPage> {
        self.store.list_entities(filter)
    }

    pub fn trust_history(&self, entity_id: &str) -> StorageResult<Vec<TrustHistoryPoint>> {
        self.store.trust_history(entity_id)
    }

    pub fn audit_tail(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        self.store.recent_audit_events(limit)
    }

    pub fn advisory_tail(&self, limit: usize) -> StorageResult<Vec<AdvisorySession>> {
        self.store.recent_advisory_sessions(limit)
    }

    pub fn advisory_history(&self, entity_id: &str) -> StorageResult<Vec<AdvisorySession>> {
        self.store.advisory_history(entity_id, ADVISORY_HISTORY_LIMIT)
    }
}
