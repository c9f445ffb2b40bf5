//! Storage trait definitions

use crate::model::{AdvisorySession, AuditEvent, Entity, EntityType, RiskLevel, TrustHistoryPoint};
use std::path::Path;
use thiserror::Error;

/// Default number of entities returned by a listing.
pub const DEFAULT_LIST_LIMIT: usize = 500;

/// Hard ceiling on entities returned by a listing.
pub const MAX_LIST_LIMIT: usize = 2000;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("Connection lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Ordering for entity listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntitySort {
    #[default]
    Newest,
    Oldest,
    /// HIGH first, then MEDIUM, then LOW; newest first within a band
    HighestRisk,
}

impl EntitySort {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(EntitySort::Newest),
            "oldest" => Some(EntitySort::Oldest),
            "highest_risk" | "highest-risk" | "risk" => Some(EntitySort::HighestRisk),
            _ => None,
        }
    }
}

/// Filter criteria for entity listings
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub entity_type: Option<EntityType>,
    pub risk_level: Option<RiskLevel>,
    pub session_id: Option<String>,
    pub sort: EntitySort,
    /// Requested page size; clamped by [`EntityFilter::effective_limit`]
    pub limit: Option<usize>,
}

impl EntityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_sort(mut self, sort: EntitySort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Page size after clamping into 1..=2000 (default 500).
    pub fn effective_limit(&self) -> usize {
        clamp_limit(self.limit.unwrap_or(DEFAULT_LIST_LIMIT))
    }
}

/// Clamp a caller-supplied row limit into 1..=2000.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

/// One page of entities plus the number of rows matching the filter
#[derive(Debug, Clone, PartialEq)]
pub struct EntityPage {
    pub entities: Vec<Entity>,
    /// Matching rows, independent of the page size
    pub total: usize,
}

/// Durable store for entities and their append-only history.
///
/// Implementations must be thread-safe (Send + Sync). Every method is a
/// short synchronous call.
pub trait EvidenceStore: Send + Sync {
    // === Entities ===

    /// Insert or update an entity keyed by `entity_id`
    fn upsert_entity(&self, entity: &Entity) -> StorageResult<()>;

    fn load_entity(&self, entity_id: &str) -> StorageResult<Option<Entity>>;

    fn list_entities(&self, filter: &EntityFilter) -> StorageResult<EntityPage>;

    /// Most recently detected entities, newest first
    fn recent_entities(&self, limit: usize) -> StorageResult<Vec<Entity>>;

    // === Trust history ===

    fn append_trust_point(&self, point: &TrustHistoryPoint) -> StorageResult<()>;

    /// Every point for an entity, oldest first
    fn trust_history(&self, entity_id: &str) -> StorageResult<Vec<TrustHistoryPoint>>;

    // === Audit log ===

    /// Insert unless `event_id` already exists. Returns whether a row was written.
    fn insert_audit_event(&self, event: &AuditEvent) -> StorageResult<bool>;

    /// Newest first
    fn recent_audit_events(&self, limit: usize) -> StorageResult<Vec<AuditEvent>>;

    // === Advisory transcripts ===

    fn append_advisory_session(&self, session: &AdvisorySession) -> StorageResult<()>;

    /// Newest first, across all entities
    fn recent_advisory_sessions(&self, limit: usize) -> StorageResult<Vec<AdvisorySession>>;

    /// The latest `limit` sessions for an entity, returned oldest first
    fn advisory_history(&self, entity_id: &str, limit: usize) -> StorageResult<Vec<AdvisorySession>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: EvidenceStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
