//! Wire payloads from analyzers and their normalization into [`AnalyzerResult`]

use super::provider::{ChatMessage, ProviderError};
use super::result::AnalyzerResult;
use crate::capture::TextCapture;
use crate::model::RiskLevel;
use serde::Deserialize;

/// Image analyzer response body.
///
/// The service also echoes its own trust fields; those are ignored because
/// the trust score is owned locally.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageAnalyzerResponse {
    pub fake_probability: f64,
    #[serde(default)]
    pub risk_level: Option<String>,
    #[serde(default)]
    pub forensic_explanation: Vec<String>,
}

impl ImageAnalyzerResponse {
    pub fn into_result(self, provider: &str) -> AnalyzerResult {
        AnalyzerResult::new(provider)
            .with_fake_probability(self.fake_probability)
            .with_risk(risk_or_low(self.risk_level.as_deref()))
            .with_findings(self.forensic_explanation)
    }
}

/// Primary text analyzer response body.
///
/// Older deployments name the findings `explanation`, newer ones
/// `forensic_explanation`; both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct TextAnalyzerResponse {
    pub ai_generated_probability: f64,
    #[serde(default)]
    pub misinformation_risk: Option<String>,
    #[serde(default)]
    pub credibility_score: Option<f64>,
    #[serde(default)]
    pub explanation: Option<Vec<String>>,
    #[serde(default)]
    pub forensic_explanation: Option<Vec<String>>,
}

impl TextAnalyzerResponse {
    pub fn into_result(self, provider: &str) -> AnalyzerResult {
        let findings = self
            .forensic_explanation
            .or(self.explanation)
            .unwrap_or_default();
        let mut result = AnalyzerResult::new(provider)
            .with_ai_generated_probability(self.ai_generated_probability)
            .with_risk(risk_or_low(self.misinformation_risk.as_deref()))
            .with_findings(findings);
        if let Some(c) = self.credibility_score {
            result = result.with_credibility_score(c);
        }
        result
    }
}

/// Strict enrichment object requested from the enrichment chain.
///
/// Every field is required; a missing one is a shape mismatch and fails the
/// attempt. `misinformation_risk` stays a raw label so an unknown value
/// degrades to LOW instead of failing.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentPayload {
    pub summary: String,
    pub topic: String,
    pub key_claims: Vec<String>,
    pub ai_generated_probability: f64,
    pub misinformation_risk: serde_json::Value,
    pub credibility_score: f64,
    pub forensic_explanation: Vec<String>,
}

impl EnrichmentPayload {
    pub fn into_result(self, provider: &str) -> AnalyzerResult {
        let risk = risk_or_low(self.misinformation_risk.as_str());
        AnalyzerResult::new(provider)
            .with_ai_generated_probability(self.ai_generated_probability)
            .with_credibility_score(self.credibility_score)
            .with_risk(risk)
            .with_findings(self.forensic_explanation)
            .with_enrichment(self.summary, self.topic, self.key_claims)
    }
}

fn risk_or_low(label: Option<&str>) -> RiskLevel {
    label.map(RiskLevel::parse_or_low).unwrap_or_default()
}

/// Parse an enrichment provider reply into a normalized result.
pub fn parse_enrichment(text: &str) -> Result<EnrichmentPayload, ProviderError> {
    let value = extract_json(text)
        .ok_or_else(|| ProviderError::Malformed("no JSON object in response".to_string()))?;
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Extract a JSON object from model output.
///
/// Models sometimes wrap JSON in code fences or surround it with prose.
/// Tried in order:
/// 1. Direct parse
/// 2. Contents of a ```json ... ``` or ``` ... ``` block
/// 3. The first `{` to last `}` span
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}

const ENRICHMENT_INSTRUCTION: &str = "You are a forensic content analyst. Assess the article \
for signs of AI generation and misinformation. Reply with a single JSON object and nothing \
else, using exactly these fields: summary (string), topic (string), key_claims (array of \
strings), ai_generated_probability (number 0-1), misinformation_risk (\"LOW\", \"MEDIUM\" or \
\"HIGH\"), credibility_score (number 0-1), forensic_explanation (array of at most 6 strings). \
Use cautious, probabilistic language.";

/// Build the enrichment request for an article capture.
pub fn enrichment_messages(capture: &TextCapture) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ENRICHMENT_INSTRUCTION),
        ChatMessage::user(format!(
            "Title: {}\nURL: {}\nWord count: {}\n\n{}",
            capture.title, capture.source_locator, capture.word_count, capture.raw_text
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ENRICHMENT: &str = r#"{
        "summary": "A report on local elections.",
        "topic": "Politics",
        "key_claims": ["Turnout rose", "Results delayed"],
        "ai_generated_probability": 0.9,
        "misinformation_risk": "HIGH",
        "credibility_score": 0.3,
        "forensic_explanation": ["Repetitive phrasing"]
    }"#;

    #[test]
    fn extract_plain_json() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn extract_json_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 2}\n```\nThanks";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 2}));
    }

    #[test]
    fn extract_json_from_bare_fence() {
        let text = "```\n{\"a\": 3}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 3}));
    }

    #[test]
    fn extract_json_from_surrounding_prose() {
        let text = "Result: {\"a\": 4} (end)";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 4}));
    }

    #[test]
    fn extract_json_rejects_non_objects() {
        assert!(extract_json("[1, 2, 3]").is_none());
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn enrichment_parses_and_normalizes() {
        let payload = parse_enrichment(&format!("```json\n{}\n```", ENRICHMENT)).unwrap();
        let r = payload.into_result("groq");
        assert_eq!(r.ai_generated_probability, Some(0.9));
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.topic.as_deref(), Some("Politics"));
        assert_eq!(r.key_claims.len(), 2);
        assert_eq!(r.provider, "groq");
    }

    #[test]
    fn enrichment_missing_field_is_malformed() {
        let err = parse_enrichment(r#"{"summary": "x", "topic": "y"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[test]
    fn enrichment_unknown_risk_defaults_low() {
        let text = ENRICHMENT.replace("\"HIGH\"", "\"SEVERE\"");
        let r = parse_enrichment(&text).unwrap().into_result("p");
        assert_eq!(r.risk_level, RiskLevel::Low);
    }

    #[test]
    fn enrichment_probabilities_clamped() {
        let text = ENRICHMENT.replace("0.9", "1.4");
        let r = parse_enrichment(&text).unwrap().into_result("p");
        assert_eq!(r.ai_generated_probability, Some(1.0));
    }

    #[test]
    fn text_response_accepts_either_findings_key() {
        let legacy: TextAnalyzerResponse = serde_json::from_value(json!({
            "ai_generated_probability": 0.4,
            "misinformation_risk": "medium",
            "credibility_score": 0.7,
            "explanation": ["legacy finding"]
        }))
        .unwrap();
        let r = legacy.into_result("heuristic");
        assert_eq!(r.findings, vec!["legacy finding"]);
        assert_eq!(r.risk_level, RiskLevel::Medium);

        let current: TextAnalyzerResponse = serde_json::from_value(json!({
            "ai_generated_probability": 0.4,
            "forensic_explanation": ["new finding"]
        }))
        .unwrap();
        let r = current.into_result("heuristic");
        assert_eq!(r.findings, vec!["new finding"]);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert_eq!(r.credibility_score, None);
    }

    #[test]
    fn image_response_ignores_remote_trust_fields() {
        let resp: ImageAnalyzerResponse = serde_json::from_value(json!({
            "fake_probability": 0.82,
            "risk_level": "HIGH",
            "forensic_explanation": [],
            "trust_score": 18.0,
            "trust_score_delta": -82.0,
            "session_id": "remote"
        }))
        .unwrap();
        let r = resp.into_result("image");
        assert_eq!(r.fake_probability, Some(0.82));
        assert!(r.findings.is_empty());
    }
}
