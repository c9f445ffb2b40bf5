//! entityx: content-integrity monitoring core
//!
//! Observes content rendered in a browser surface, submits images and
//! article text to external analyzers, merges their results into canonical
//! entities, keeps a per-session trust score and persists everything to an
//! audit-safe store.
//!
//! # Pipeline
//!
//! - **capture**: deduplicates surface observations into captures
//! - **gateway**: fans captures out to analyzers with fallback chains
//! - **reconcile**: merges analyzer output into one entity
//! - **trust**: applies score deductions per session
//! - **storage**: SQLite store plus an in-memory entity cache
//! - **query** / **export**: read-side access and evidence reports
//!
//! # Example
//!
//! ```
//! use entityx::trust::TrustScoreEngine;
//!
//! let engine = TrustScoreEngine::new();
//! assert_eq!(engine.score("any-session"), 100.0);
//! ```

pub mod advisory;
pub mod capture;
pub mod config;
pub mod export;
pub mod gateway;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod storage;
pub mod trust;

pub use model::{
    AdvisorySession, AuditEvent, AuditEventType, Entity, EntityAnalysis, EntityType, ReconciledEntity,
    RiskLevel, SessionType, TrustHistoryPoint,
};
pub use pipeline::{MonitorPipeline, PipelineError, PipelineEvent};
pub use storage::{EvidenceStore, OpenStore, Persistence, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
