//! Per-session trust score engine
//!
//! Each session starts at 100. An entity deducts `p × 100` where `p` is its
//! deduction probability; the result is clamped into [0, 100] once and
//! rounded to two decimals.

use crate::model::{Entity, ReconciledEntity, TrustHistoryPoint};
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

pub const INITIAL_TRUST_SCORE: f64 = 100.0;
pub const MIN_TRUST_SCORE: f64 = 0.0;
pub const MAX_TRUST_SCORE: f64 = 100.0;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Owns the running score of every session.
#[derive(Debug, Default)]
pub struct TrustScoreEngine {
    scores: DashMap<String, f64>,
}

impl TrustScoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current score for a session (100 if never touched).
    pub fn score(&self, session_id: &str) -> f64 {
        self.scores
            .get(session_id)
            .map(|s| *s)
            .unwrap_or(INITIAL_TRUST_SCORE)
    }

    /// Restart a session at the initial score.
    pub fn reset(&self, session_id: &str) {
        self.scores.remove(session_id);
    }

    /// Score an entity against its session.
    ///
    /// The read-modify-write happens under the session's shard lock, so
    /// concurrent entities in one session are applied one after another.
    /// The history point is stamped under the same lock, keeping timestamp
    /// order equal to application order.
    pub fn apply(&self, entity: ReconciledEntity) -> (Entity, TrustHistoryPoint) {
        let delta = round2(-(entity.deduction_probability() * 100.0));
        let (new_score, stamped_at) = {
            let mut slot = self
                .scores
                .entry(entity.session_id.clone())
                .or_insert(INITIAL_TRUST_SCORE);
            let updated = round2((*slot + delta).clamp(MIN_TRUST_SCORE, MAX_TRUST_SCORE));
            *slot = updated;
            (updated, Utc::now())
        };

        debug!(
            session = %entity.session_id,
            entity_id = %entity.entity_id,
            delta,
            score = new_score,
            "trust score updated"
        );

        let point = TrustHistoryPoint {
            entity_id: entity.entity_id.clone(),
            trust_score: new_score,
            delta,
            timestamp: stamped_at,
        };
        (entity.into_scored(new_score, delta), point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityAnalysis, EntityType, RiskLevel};
    use chrono::Duration;
    use std::sync::Arc;

    fn text_entity(session: &str, p: Option<f64>) -> ReconciledEntity {
        ReconciledEntity {
            entity_id: format!("e-{:?}", p),
            entity_type: EntityType::Text,
            source_url: "https://news.test/a".into(),
            title: Some("A".into()),
            extracted_text: Some("text".into()),
            risk_level: RiskLevel::Low,
            analysis: EntityAnalysis {
                ai_generated_probability: p,
                primary_provider: "heuristic".into(),
                ..Default::default()
            },
            detected_at: Utc::now(),
            analyzed_at: Utc::now(),
            session_id: session.into(),
        }
    }

    #[test]
    fn deterministic_sequence() {
        let engine = TrustScoreEngine::new();
        let mut scores = Vec::new();
        let mut deltas = Vec::new();
        for p in [0.8, 0.3, 0.9] {
            let (entity, point) = engine.apply(text_entity("s", Some(p)));
            assert_eq!(entity.trust_score, point.trust_score);
            scores.push(entity.trust_score);
            deltas.push(entity.trust_score_delta);
        }
        assert_eq!(scores, vec![20.0, 0.0, 0.0]);
        assert_eq!(deltas, vec![-80.0, -30.0, -90.0]);
    }

    #[test]
    fn sessions_are_independent() {
        let engine = TrustScoreEngine::new();
        engine.apply(text_entity("a", Some(0.5)));
        assert_eq!(engine.score("a"), 50.0);
        assert_eq!(engine.score("b"), 100.0);
        engine.reset("a");
        assert_eq!(engine.score("a"), 100.0);
    }

    #[test]
    fn missing_probability_deducts_nothing() {
        let engine = TrustScoreEngine::new();
        let (entity, _) = engine.apply(text_entity("s", None));
        assert_eq!(entity.trust_score, 100.0);
        assert_eq!(entity.trust_score_delta, 0.0);
    }

    #[test]
    fn unknown_type_deducts_nothing() {
        let engine = TrustScoreEngine::new();
        let mut e = text_entity("s", Some(0.7));
        e.entity_type = EntityType::Unknown;
        let (entity, _) = engine.apply(e);
        assert_eq!(entity.trust_score, 100.0);
    }

    #[test]
    fn image_uses_fake_probability() {
        let engine = TrustScoreEngine::new();
        let mut e = text_entity("s", Some(0.9));
        e.entity_type = EntityType::Image;
        e.analysis.fake_probability = Some(0.123);
        let (entity, point) = engine.apply(e);
        assert_eq!(point.delta, -12.3);
        assert_eq!(entity.trust_score, 87.7);
    }

    #[test]
    fn score_always_within_bounds() {
        let engine = TrustScoreEngine::new();
        for i in 0..50 {
            let p = (i as f64 * 0.37) % 1.0;
            let (entity, _) = engine.apply(text_entity("s", Some(p)));
            assert!((0.0..=100.0).contains(&entity.trust_score));
        }
    }

    #[test]
    fn history_points_follow_application_order() {
        let engine = TrustScoreEngine::new();
        let late = text_entity("s", Some(0.5));
        let mut early = text_entity("s", Some(0.5));
        early.analyzed_at = late.analyzed_at - Duration::seconds(30);

        let (_, first) = engine.apply(late);
        let (_, second) = engine.apply(early);
        assert_eq!(first.trust_score, 50.0);
        assert_eq!(second.trust_score, 0.0);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let engine = Arc::new(TrustScoreEngine::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    engine.apply(text_entity("shared", Some(0.05)));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(engine.score("shared"), 60.0);
    }
}
