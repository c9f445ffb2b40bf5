//! Read-side facade over the persistence layer
//!
//! Everything here reads through [`Persistence`]; the only write is the
//! ENTITY_VIEWED audit recorded by [`QueryFacade::open_entity`].

use crate::model::{
    session_or_default, AdvisorySession, AuditEvent, AuditEventType, Entity, TrustHistoryPoint,
};
use crate::storage::{EntityFilter, EntityPage, Persistence, StorageResult};
use serde_json::json;

#[derive(Clone)]
pub struct QueryFacade {
    persistence: Persistence,
}

impl QueryFacade {
    pub fn new(persistence: Persistence) -> Self {
        Self { persistence }
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Filtered, sorted listing with a total independent of the page size.
    pub fn list(&self, filter: &EntityFilter) -> StorageResult<EntityPage> {
        self.persistence.list_entities(filter)
    }

    pub fn get(&self, entity_id: &str) -> StorageResult<Option<Entity>> {
        self.persistence.entity(entity_id)
    }

    /// Fetch an entity for display and audit the view.
    pub fn open_entity(&self, entity_id: &str, session_id: Option<&str>) -> StorageResult<Option<Entity>> {
        let entity = self.persistence.entity(entity_id)?;
        if let Some(ref e) = entity {
            let event = AuditEvent::new(AuditEventType::EntityViewed)
                .with_entity(&e.entity_id)
                .with_session(session_or_default(session_id))
                .with_metadata(json!({
                    "entity_type": e.entity_type.as_str(),
                    "risk_level": e.risk_level.as_str(),
                }));
            self.persistence.record_audit_event(&event);
        }
        Ok(entity)
    }

    pub fn trust_history(&self, entity_id: &str) -> StorageResult<Vec<TrustHistoryPoint>> {
        self.persistence.trust_history(entity_id)
    }

    pub fn audit_tail(&self, limit: usize) -> StorageResult<Vec<AuditEvent>> {
        self.persistence.audit_tail(limit)
    }

    pub fn advisory_tail(&self, limit: usize) -> StorageResult<Vec<AdvisorySession>> {
        self.persistence.advisory_tail(limit)
    }

    /// Up to 200 most recent sessions for an entity, oldest first.
    pub fn advisory_history(&self, entity_id: &str) -> StorageResult<Vec<AdvisorySession>> {
        self.persistence.advisory_history(entity_id)
    }
}
