//! Append-only records: trust history, audit log, advisory transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One trust-score change caused by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustHistoryPoint {
    pub entity_id: String,
    /// Absolute score after the change
    pub trust_score: f64,
    pub delta: f64,
    pub timestamp: DateTime<Utc>,
}

/// Closed set of auditable actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    EntityDetected,
    EntityViewed,
    AdvisoryChatUsed,
    ReportExported,
    ManualAnalysisRequested,
    AnalysisFailed,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::EntityDetected => "ENTITY_DETECTED",
            AuditEventType::EntityViewed => "ENTITY_VIEWED",
            AuditEventType::AdvisoryChatUsed => "ADVISORY_CHAT_USED",
            AuditEventType::ReportExported => "REPORT_EXPORTED",
            AuditEventType::ManualAnalysisRequested => "MANUAL_ANALYSIS_REQUESTED",
            AuditEventType::AnalysisFailed => "ANALYSIS_FAILED",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ENTITY_DETECTED" => Some(AuditEventType::EntityDetected),
            "ENTITY_VIEWED" => Some(AuditEventType::EntityViewed),
            "ADVISORY_CHAT_USED" => Some(AuditEventType::AdvisoryChatUsed),
            "REPORT_EXPORTED" => Some(AuditEventType::ReportExported),
            "MANUAL_ANALYSIS_REQUESTED" => Some(AuditEventType::ManualAnalysisRequested),
            "ANALYSIS_FAILED" => Some(AuditEventType::AnalysisFailed),
            _ => None,
        }
    }
}

/// Immutable record of a significant system action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub event_type: AuditEventType,
    pub entity_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    /// New event with a fresh random id and an empty metadata object.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            entity_id: None,
            session_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Which advisory flow produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    LegalChat,
    ComplaintDraft,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::LegalChat => "LEGAL_CHAT",
            SessionType::ComplaintDraft => "COMPLAINT_DRAFT",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "LEGAL_CHAT" => Some(SessionType::LegalChat),
            "COMPLAINT_DRAFT" => Some(SessionType::ComplaintDraft),
            _ => None,
        }
    }
}

/// One user query and the generated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorySession {
    pub entity_id: Option<String>,
    pub user_query: String,
    pub ai_response: String,
    pub session_type: SessionType,
    /// Chain member that produced the response
    pub provider: Option<String>,
    pub timestamp: DateTime<Utc>,
}
