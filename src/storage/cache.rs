//! In-memory entity index
//!
//! A non-authoritative projection of the `entities` table keyed by
//! `entity_id`. It can always be rebuilt from the store.

use crate::model::Entity;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct EntityCache {
    entries: DashMap<String, Entity>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: &str) -> Option<Entity> {
        self.entries.get(entity_id).map(|e| e.value().clone())
    }

    /// Run `write` while holding this id's entry, then cache the entity if
    /// the write succeeded.
    ///
    /// Writers of the same id are serialized, so the cached row is always the
    /// one the store saw last.
    pub fn write_through<E>(
        &self,
        entity: &Entity,
        write: impl FnOnce(&Entity) -> Result<(), E>,
    ) -> Result<(), E> {
        match self.entries.entry(entity.entity_id.clone()) {
            Entry::Occupied(mut slot) => {
                write(entity)?;
                slot.insert(entity.clone());
            }
            Entry::Vacant(slot) => {
                write(entity)?;
                slot.insert(entity.clone());
            }
        }
        Ok(())
    }

    /// Insert only when no entry exists. Returns whether it was inserted.
    pub fn insert_if_absent(&self, entity: Entity) -> bool {
        match self.entries.entry(entity.entity_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entity);
                true
            }
        }
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.entries.contains_key(entity_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityAnalysis, EntityType, RiskLevel};
    use chrono::Utc;

    fn entity(id: &str, score: f64) -> Entity {
        Entity {
            entity_id: id.into(),
            entity_type: EntityType::Image,
            source_url: "https://cdn.test/a.png".into(),
            title: None,
            extracted_text: None,
            risk_level: RiskLevel::Low,
            analysis: EntityAnalysis::default(),
            detected_at: Utc::now(),
            analyzed_at: Utc::now(),
            trust_score: score,
            trust_score_delta: 0.0,
            session_id: "s".into(),
        }
    }

    #[test]
    fn insert_if_absent_keeps_existing_entry() {
        let cache = EntityCache::new();
        assert!(cache.insert_if_absent(entity("a", 90.0)));
        assert!(!cache.insert_if_absent(entity("a", 10.0)));
        assert_eq!(cache.get("a").unwrap().trust_score, 90.0);
    }

    #[test]
    fn write_through_replaces_on_success() {
        let cache = EntityCache::new();
        cache.write_through(&entity("a", 90.0), |_| Ok::<_, ()>(())).unwrap();
        cache.write_through(&entity("a", 10.0), |_| Ok::<_, ()>(())).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().trust_score, 10.0);
    }

    #[test]
    fn failed_write_leaves_cache_untouched() {
        let cache = EntityCache::new();
        cache.write_through(&entity("a", 90.0), |_| Ok::<_, ()>(())).unwrap();
        let err = cache.write_through(&entity("a", 10.0), |_| Err("disk full"));
        assert_eq!(err, Err("disk full"));
        assert_eq!(cache.get("a").unwrap().trust_score, 90.0);

        assert!(cache.write_through(&entity("b", 5.0), |_| Err("disk full")).is_err());
        assert!(!cache.contains("b"));
    }
}
