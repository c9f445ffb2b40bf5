//! Core data model shared by every stage of the monitor

mod entity;
mod records;

pub use entity::{Entity, EntityAnalysis, EntityType, ReconciledEntity, RiskLevel};
pub use records::{AdvisorySession, AuditEvent, AuditEventType, SessionType, TrustHistoryPoint};

/// Session id used when a caller does not supply one.
pub const DEFAULT_SESSION: &str = "default-session";

/// Normalize a caller-supplied session id, falling back to [`DEFAULT_SESSION`].
pub fn session_or_default(session_id: Option<&str>) -> String {
    match session_id.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => DEFAULT_SESSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_falls_back_to_default() {
        assert_eq!(session_or_default(None), DEFAULT_SESSION);
        assert_eq!(session_or_default(Some("   ")), DEFAULT_SESSION);
        assert_eq!(session_or_default(Some(" tab-7 ")), "tab-7");
    }
}
