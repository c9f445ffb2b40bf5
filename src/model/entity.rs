//! Entity representation: the canonical record of one analyzed capture

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Misinformation / manipulation risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Parse a provider-supplied label. Anything unrecognized is LOW.
    pub fn parse_or_low(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "HIGH" => RiskLevel::High,
            "MEDIUM" => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of content an entity was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Image,
    Text,
    News,
    Unknown,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Image => "IMAGE",
            EntityType::Text => "TEXT",
            EntityType::News => "NEWS",
            EntityType::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "IMAGE" => EntityType::Image,
            "TEXT" => EntityType::Text,
            "NEWS" => EntityType::News,
            _ => EntityType::Unknown,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured analysis payload, stored as an opaque JSON blob.
///
/// Every enrichment-only field is always present: `None` / empty when no
/// enrichment provider answered, so consumers never probe for missing keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityAnalysis {
    pub fake_probability: Option<f64>,
    pub ai_generated_probability: Option<f64>,
    pub credibility_score: Option<f64>,
    #[serde(default)]
    pub forensic_findings: Vec<String>,
    pub word_count: Option<usize>,
    pub primary_provider: String,
    pub enrichment_provider: Option<String>,
    pub summary: Option<String>,
    pub topic: Option<String>,
    #[serde(default)]
    pub key_claims: Vec<String>,
    #[serde(default)]
    pub enriched: bool,
}

/// A merged entity that has not yet passed through the trust score engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntity {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub source_url: String,
    pub title: Option<String>,
    pub extracted_text: Option<String>,
    pub risk_level: RiskLevel,
    pub analysis: EntityAnalysis,
    pub detected_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
    pub session_id: String,
}

impl ReconciledEntity {
    /// Probability that drives the trust deduction for this entity.
    ///
    /// Images use `fake_probability`; article text uses
    /// `ai_generated_probability`. Anything else deducts nothing.
    pub fn deduction_probability(&self) -> f64 {
        let p = match self.entity_type {
            EntityType::Image => self.analysis.fake_probability,
            EntityType::Text | EntityType::News => self.analysis.ai_generated_probability,
            EntityType::Unknown => None,
        };
        p.unwrap_or(0.0)
    }

    /// Attach the trust score produced by the engine.
    pub fn into_scored(self, trust_score: f64, trust_score_delta: f64) -> Entity {
        Entity {
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            source_url: self.source_url,
            title: self.title,
            extracted_text: self.extracted_text,
            risk_level: self.risk_level,
            analysis: self.analysis,
            detected_at: self.detected_at,
            analyzed_at: self.analyzed_at,
            trust_score,
            trust_score_delta,
            session_id: self.session_id,
        }
    }
}

/// The canonical, durable record of one analyzed capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub source_url: String,
    pub title: Option<String>,
    pub extracted_text: Option<String>,
    pub risk_level: RiskLevel,
    pub analysis: EntityAnalysis,
    pub detected_at: DateTime<Utc>,
    pub analyzed_at: DateTime<Utc>,
    pub trust_score: f64,
    pub trust_score_delta: f64,
    pub session_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_labels_parse_case_insensitively() {
        assert_eq!(RiskLevel::parse_or_low("high"), RiskLevel::High);
        assert_eq!(RiskLevel::parse_or_low(" Medium "), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse_or_low("LOW"), RiskLevel::Low);
    }

    #[test]
    fn invalid_risk_label_defaults_to_low() {
        assert_eq!(RiskLevel::parse_or_low("catastrophic"), RiskLevel::Low);
        assert_eq!(RiskLevel::parse_or_low(""), RiskLevel::Low);
    }

    #[test]
    fn risk_serializes_uppercase() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn analysis_blob_keeps_enrichment_fields_explicit() {
        let analysis = EntityAnalysis {
            primary_provider: "heuristic".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&analysis).unwrap();
        assert!(value.get("summary").unwrap().is_null());
        assert!(value.get("topic").unwrap().is_null());
        assert_eq!(value["key_claims"], serde_json::json!([]));
        assert_eq!(value["forensic_findings"], serde_json::json!([]));
    }

    #[test]
    fn scoring_keeps_reconciled_fields() {
        let now = Utc::now();
        let reconciled = ReconciledEntity {
            entity_id: "abc".into(),
            entity_type: EntityType::Image,
            source_url: "https://cdn.example.com/a.png".into(),
            title: None,
            extracted_text: None,
            risk_level: RiskLevel::Low,
            analysis: EntityAnalysis::default(),
            detected_at: now,
            analyzed_at: now,
            session_id: "s".into(),
        };
        let entity = reconciled.into_scored(100.0, 0.0);
        assert_eq!(entity.source_url, "https://cdn.example.com/a.png");
        assert_eq!(entity.entity_type, EntityType::Image);
        assert_eq!(entity.detected_at, now);
        assert_eq!(entity.trust_score, 100.0);
        assert_eq!(entity.trust_score_delta, 0.0);
    }
}
