//! Entity reconciler: merges a primary result and optional enrichment into
//! one canonical entity record

use crate::capture::Capture;
use crate::gateway::{AnalyzerResult, GatewayOutput};
use crate::model::{EntityAnalysis, EntityType, ReconciledEntity};
use chrono::Utc;
use sha2::{Digest, Sha256};

const ENTITY_ID_LEN: usize = 16;

/// Stable identity for a capture.
///
/// Images hash `image-{url}`; article text hashes `text-{url}-{title}`. The
/// result is the first 16 lowercase hex characters of the SHA-256 digest.
pub fn entity_id(capture: &Capture) -> String {
    let key = match capture {
        Capture::Image(image) => format!("image-{}", image.source_locator),
        Capture::Text(text) => format!("text-{}-{}", text.source_locator, text.title),
    };
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..ENTITY_ID_LEN].to_string()
}

/// Merge analyzer output for `capture` into an unscored entity.
///
/// Enrichment, when present, wins for `ai_generated_probability`,
/// `credibility_score`, `risk_level` and non-empty findings. Primary-only
/// fields are kept. Enrichment-only fields are empty without enrichment.
pub fn reconcile(capture: &Capture, output: GatewayOutput, session_id: &str) -> ReconciledEntity {
    let GatewayOutput { primary, enrichment } = output;
    let mut analysis = primary_analysis(&primary);
    let mut risk_level = primary.risk_level;

    if let Some(enrichment) = enrichment {
        analysis.ai_generated_probability = enrichment
            .ai_generated_probability
            .or(analysis.ai_generated_probability);
        analysis.credibility_score = enrichment.credibility_score.or(analysis.credibility_score);
        if !enrichment.findings.is_empty() {
            analysis.forensic_findings = enrichment.findings;
        }
        risk_level = enrichment.risk_level;
        analysis.enrichment_provider = Some(enrichment.provider);
        analysis.summary = enrichment.summary;
        analysis.topic = enrichment.topic;
        analysis.key_claims = enrichment.key_claims;
        analysis.enriched = true;
    }

    let (entity_type, title, extracted_text) = match capture {
        Capture::Image(_) => (EntityType::Image, None, None),
        Capture::Text(text) => {
            analysis.word_count = Some(text.word_count);
            (
                EntityType::Text,
                Some(text.title.clone()),
                Some(text.raw_text.clone()),
            )
        }
    };

    ReconciledEntity {
        entity_id: entity_id(capture),
        entity_type,
        source_url: capture.source_locator().to_string(),
        title,
        extracted_text,
        risk_level,
        analysis,
        detected_at: capture.observed_at(),
        analyzed_at: Utc::now(),
        session_id: session_id.to_string(),
    }
}

fn primary_analysis(primary: &AnalyzerResult) -> EntityAnalysis {
    EntityAnalysis {
        fake_probability: primary.fake_probability,
        ai_generated_probability: primary.ai_generated_probability,
        credibility_score: primary.credibility_score,
        forensic_findings: primary.findings.clone(),
        word_count: None,
        primary_provider: primary.provider.clone(),
        enrichment_provider: None,
        summary: None,
        topic: None,
        key_claims: Vec::new(),
        enriched: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskLevel;

    fn article() -> Capture {
        Capture::text("https://news.test/story", "Story", "alpha beta gamma delta")
    }

    fn primary() -> AnalyzerResult {
        AnalyzerResult::new("heuristic")
            .with_ai_generated_probability(0.2)
            .with_risk(RiskLevel::Low)
            .with_findings(["repetitive phrasing"])
    }

    fn enrichment() -> AnalyzerResult {
        AnalyzerResult::new("groq")
            .with_ai_generated_probability(0.9)
            .with_credibility_score(0.1)
            .with_risk(RiskLevel::High)
            .with_findings(["uniform sentence length", "no sources"])
            .with_enrichment("A summary", "Politics", vec!["claim one".into()])
    }

    #[test]
    fn entity_id_is_stable_and_short() {
        let a = entity_id(&article());
        let b = entity_id(&Capture::text("https://news.test/story", "Story", "different text"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn entity_id_matches_sha256_prefix() {
        let id = entity_id(&Capture::image("https://cdn.test/a.png"));
        let expected = hex::encode(Sha256::digest(b"image-https://cdn.test/a.png"));
        assert_eq!(id, expected[..16]);
    }

    #[test]
    fn title_participates_in_text_identity() {
        let a = entity_id(&Capture::text("https://news.test/story", "Story", "x"));
        let b = entity_id(&Capture::text("https://news.test/story", "Other", "x"));
        assert_ne!(a, b);
    }

    #[test]
    fn enrichment_overrides_primary() {
        let merged = reconcile(
            &article(),
            GatewayOutput {
                primary: primary(),
                enrichment: Some(enrichment()),
            },
            "s1",
        );
        assert_eq!(merged.analysis.ai_generated_probability, Some(0.9));
        assert_eq!(merged.risk_level, RiskLevel::High);
        assert_eq!(merged.analysis.topic.as_deref(), Some("Politics"));
        assert_eq!(merged.analysis.credibility_score, Some(0.1));
        assert_eq!(merged.analysis.forensic_findings.len(), 2);
        assert_eq!(merged.analysis.primary_provider, "heuristic");
        assert_eq!(merged.analysis.enrichment_provider.as_deref(), Some("groq"));
        assert_eq!(merged.analysis.word_count, Some(4));
        assert_eq!(merged.extracted_text.as_deref(), Some("alpha beta gamma delta"));
        assert!(merged.analysis.enriched);
    }

    #[test]
    fn missing_enrichment_leaves_explicit_empty_fields() {
        let merged = reconcile(
            &article(),
            GatewayOutput {
                primary: primary(),
                enrichment: None,
            },
            "s1",
        );
        assert_eq!(merged.analysis.ai_generated_probability, Some(0.2));
        assert_eq!(merged.risk_level, RiskLevel::Low);
        assert!(merged.analysis.summary.is_none());
        assert!(merged.analysis.key_claims.is_empty());
        assert!(!merged.analysis.enriched);

        let json = serde_json::to_value(&merged.analysis).unwrap();
        assert!(json.get("summary").unwrap().is_null());
        assert_eq!(json["key_claims"], serde_json::json!([]));
    }

    #[test]
    fn empty_primary_findings_stay_an_empty_list() {
        let merged = reconcile(
            &Capture::image("https://cdn.test/a.png"),
            GatewayOutput {
                primary: AnalyzerResult::new("img").with_fake_probability(0.4),
                enrichment: None,
            },
            "s1",
        );
        assert!(merged.analysis.forensic_findings.is_empty());
        assert_eq!(merged.entity_type, EntityType::Image);
        assert!(merged.title.is_none());
        assert_eq!(merged.analysis.fake_probability, Some(0.4));
        let json = serde_json::to_value(&merged.analysis).unwrap();
        assert_eq!(json["forensic_findings"], serde_json::json!([]));
    }
}
