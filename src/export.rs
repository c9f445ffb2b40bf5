//! Evidence report export
//!
//! A report bundles an entity with its trust history, advisory transcript
//! and a plain-language evidence narrative, written as pretty JSON.

use crate::model::{
    session_or_default, AdvisorySession, AuditEvent, AuditEventType, Entity, EntityType,
    RiskLevel, TrustHistoryPoint,
};
use crate::query::QueryFacade;
use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

const MAX_NARRATED_FINDINGS: usize = 10;
const MAX_NARRATED_CLAIMS: usize = 8;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of an export request that did not hard-fail
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    /// No destination was chosen; nothing was written or audited
    Cancelled,
}

/// Everything known about one entity, ready to hand to a reviewer
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceReport {
    pub entity: Entity,
    pub trust_history: Vec<TrustHistoryPoint>,
    pub advisory_history: Vec<AdvisorySession>,
    pub evidence: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl EvidenceReport {
    pub fn build(query: &QueryFacade, entity_id: &str) -> Result<Self, ExportError> {
        let entity = query
            .get(entity_id)?
            .ok_or_else(|| ExportError::EntityNotFound(entity_id.to_string()))?;
        Ok(Self {
            evidence: evidence_lines(&entity),
            trust_history: query.trust_history(entity_id)?,
            advisory_history: query.advisory_history(entity_id)?,
            entity,
            generated_at: Utc::now(),
        })
    }
}

fn percent(p: f64) -> f64 {
    (p * 1000.0).round() / 10.0
}

fn band(pct: f64) -> &'static str {
    if pct >= 70.0 {
        "high"
    } else if pct >= 40.0 {
        "moderate"
    } else {
        "low"
    }
}

/// Plain-language narrative of the detection evidence for an entity.
///
/// Absent values are skipped. An entity with nothing to report yields a
/// single placeholder line.
pub fn evidence_lines(entity: &Entity) -> Vec<String> {
    let analysis = &entity.analysis;
    let mut lines = Vec::new();

    if let Some(p) = analysis.ai_generated_probability {
        let pct = percent(p);
        lines.push(format!(
            "Automated analysis assigns a {} probability ({}%) that this content was generated or substantially altered by AI.",
            band(pct),
            pct
        ));
    }

    if let (Some(p), EntityType::Image) = (analysis.fake_probability, entity.entity_type) {
        lines.push(format!(
            "Image authenticity scoring puts the probability of synthetic or manipulated origin at {}%.",
            percent(p)
        ));
    }

    let potential = match entity.risk_level {
        RiskLevel::High => "high",
        RiskLevel::Medium => "moderate",
        RiskLevel::Low => "low",
    };
    lines.push(format!(
        "Content-level assessment indicates a {} potential to mislead readers.",
        potential
    ));

    if let Some(c) = analysis.credibility_score {
        let pct = percent(c);
        let quality = if pct < 50.0 { "reduced" } else { "moderate" };
        lines.push(format!(
            "Automated credibility indicator: {}/100 ({} verifiability).",
            pct, quality
        ));
    }

    if !analysis.forensic_findings.is_empty() {
        lines.push("Forensic findings:".to_string());
        lines.extend(
            analysis
                .forensic_findings
                .iter()
                .take(MAX_NARRATED_FINDINGS)
                .enumerate()
                .map(|(i, f)| format!("  {}. {}", i + 1, f)),
        );
    }

    if let Some(ref summary) = analysis.summary {
        lines.push(format!("Model-generated summary: \"{}\"", summary));
    }

    if !analysis.key_claims.is_empty() {
        lines.push("Claims identified in the content:".to_string());
        lines.extend(
            analysis
                .key_claims
                .iter()
                .take(MAX_NARRATED_CLAIMS)
                .enumerate()
                .map(|(i, c)| format!("  {}. {}", i + 1, c)),
        );
    }

    let decrement = entity.trust_score_delta.abs();
    if decrement > 0.0 {
        lines.push(format!(
            "This detection lowered the session trust score by {} points.",
            (decrement * 100.0).round() / 100.0
        ));
    }

    lines
}

/// Writes evidence reports and audits each successful export.
pub struct ReportExporter {
    query: QueryFacade,
}

impl ReportExporter {
    pub fn new(query: QueryFacade) -> Self {
        Self { query }
    }

    /// Export a report for `entity_id` to `destination`.
    ///
    /// `None` means the user dismissed the destination prompt: the outcome is
    /// [`ExportOutcome::Cancelled`] and nothing is read, written or audited.
    pub fn export_report(
        &self,
        entity_id: &str,
        destination: Option<&Path>,
        session_id: Option<&str>,
    ) -> Result<ExportOutcome, ExportError> {
        let Some(path) = destination else {
            return Ok(ExportOutcome::Cancelled);
        };

        let report = EvidenceReport::build(&self.query, entity_id)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(&report)?)?;

        let event = AuditEvent::new(AuditEventType::ReportExported)
            .with_entity(entity_id)
            .with_session(session_or_default(session_id))
            .with_metadata(json!({ "path": path.display().to_string() }));
        self.query.persistence().record_audit_event(&event);

        info!(entity_id, path = %path.display(), "evidence report exported");
        Ok(ExportOutcome::Saved(path.to_path_buf()))
    }
}
