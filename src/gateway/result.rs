//! Normalized analyzer output

use crate::model::RiskLevel;
use serde::{Deserialize, Serialize};

/// Maximum number of forensic findings kept per result.
pub const MAX_FINDINGS: usize = 6;

/// Normalized output from one analyzer call.
///
/// Probabilities are always within [0, 1] and findings are capped at
/// [`MAX_FINDINGS`]; construct through [`AnalyzerResult::normalized`] or the
/// builder methods to keep those invariants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub provider: String,
    pub fake_probability: Option<f64>,
    pub ai_generated_probability: Option<f64>,
    pub credibility_score: Option<f64>,
    pub risk_level: RiskLevel,
    pub findings: Vec<String>,
    pub summary: Option<String>,
    pub topic: Option<String>,
    pub key_claims: Vec<String>,
}

impl AnalyzerResult {
    /// Empty result attributed to `provider`.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn with_fake_probability(mut self, p: f64) -> Self {
        self.fake_probability = clamp_probability(p);
        self
    }

    pub fn with_ai_generated_probability(mut self, p: f64) -> Self {
        self.ai_generated_probability = clamp_probability(p);
        self
    }

    pub fn with_credibility_score(mut self, p: f64) -> Self {
        self.credibility_score = clamp_probability(p);
        self
    }

    pub fn with_risk(mut self, risk: RiskLevel) -> Self {
        self.risk_level = risk;
        self
    }

    pub fn with_findings<I, S>(mut self, findings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.findings = normalize_findings(findings.into_iter().map(Into::into));
        self
    }

    pub fn with_enrichment(
        mut self,
        summary: impl Into<String>,
        topic: impl Into<String>,
        key_claims: Vec<String>,
    ) -> Self {
        self.summary = non_blank(summary.into());
        self.topic = non_blank(topic.into());
        self.key_claims = key_claims
            .into_iter()
            .filter_map(non_blank)
            .collect();
        self
    }

    /// Re-apply every invariant to a result built field by field.
    pub fn normalized(mut self) -> Self {
        self.fake_probability = self.fake_probability.and_then(clamp_probability);
        self.ai_generated_probability = self.ai_generated_probability.and_then(clamp_probability);
        self.credibility_score = self.credibility_score.and_then(clamp_probability);
        self.findings = normalize_findings(std::mem::take(&mut self.findings).into_iter());
        self
    }
}

/// Clamp a provider probability into [0, 1]. Non-finite values are dropped.
pub fn clamp_probability(p: f64) -> Option<f64> {
    p.is_finite().then(|| p.clamp(0.0, 1.0))
}

fn normalize_findings(findings: impl Iterator<Item = String>) -> Vec<String> {
    findings
        .filter_map(non_blank)
        .take(MAX_FINDINGS)
        .collect()
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probabilities_are_clamped() {
        let r = AnalyzerResult::new("x")
            .with_fake_probability(1.7)
            .with_ai_generated_probability(-0.2)
            .with_credibility_score(0.5);
        assert_eq!(r.fake_probability, Some(1.0));
        assert_eq!(r.ai_generated_probability, Some(0.0));
        assert_eq!(r.credibility_score, Some(0.5));
    }

    #[test]
    fn non_finite_probability_is_absent() {
        assert_eq!(clamp_probability(f64::NAN), None);
        assert_eq!(clamp_probability(f64::INFINITY), None);
    }

    #[test]
    fn findings_capped_at_six_and_blank_dropped() {
        let r = AnalyzerResult::new("x").with_findings(
            ["a", " ", "b", "c", "d", "e", "f", "g"].iter().copied(),
        );
        assert_eq!(r.findings, vec!["a", "b", "c", "d", "e", "f"]);
    }

    #[test]
    fn normalized_repairs_raw_fields() {
        let raw = AnalyzerResult {
            provider: "raw".into(),
            fake_probability: Some(3.0),
            findings: (0..10).map(|i| format!("finding {}", i)).collect(),
            ..Default::default()
        };
        let r = raw.normalized();
        assert_eq!(r.fake_probability, Some(1.0));
        assert_eq!(r.findings.len(), MAX_FINDINGS);
    }
}
