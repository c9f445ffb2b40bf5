//! Monitor pipeline: capture → gateway → reconcile → trust → persistence
//!
//! Every processed capture ends in exactly one [`PipelineEvent`]: the
//! scored entity, or the failure that prevented one.

use crate::capture::{classify_url, normalize_locator, Capture, CaptureKind};
use crate::gateway::{AnalysisGateway, GatewayError};
use crate::model::{session_or_default, AuditEvent, AuditEventType, Entity, EntityType};
use crate::reconcile::reconcile;
use crate::storage::Persistence;
use crate::trust::TrustScoreEngine;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("unsupported content type for {0}")]
    Unsupported(String),

    #[error("article text required to analyze {0}")]
    MissingText(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Published to every subscriber as captures complete
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Full merged and scored entity
    EntityDetected(Entity),
    AnalysisFailed {
        source_url: String,
        kind: CaptureKind,
        error: String,
    },
}

/// A user-initiated analysis of a single URL
#[derive(Debug, Clone, Default)]
pub struct ManualRequest {
    pub url: String,
    pub title: Option<String>,
    /// Article text; required unless the URL is an image
    pub text: Option<String>,
}

#[derive(Clone)]
pub struct MonitorPipeline {
    gateway: AnalysisGateway,
    trust: Arc<TrustScoreEngine>,
    persistence: Persistence,
    events: broadcast::Sender<PipelineEvent>,
}

impl MonitorPipeline {
    pub fn new(gateway: AnalysisGateway, trust: Arc<TrustScoreEngine>, persistence: Persistence) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            gateway,
            trust,
            persistence,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn trust(&self) -> &TrustScoreEngine {
        &self.trust
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    fn publish(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Analyze, merge, score and persist one capture.
    pub async fn process(&self, capture: Capture, session_id: &str) -> Result<Entity, PipelineError> {
        let output = match self.gateway.analyze(&capture, session_id).await {
            Ok(output) => output,
            Err(e) => {
                self.record_failure(&capture, session_id, &e);
                return Err(e.into());
            }
        };

        let merged = reconcile(&capture, output, session_id);
        let (entity, point) = self.trust.apply(merged);

        self.persistence.record_entity(&entity);
        self.persistence.record_trust_point(&point);
        let event = AuditEvent::new(AuditEventType::EntityDetected)
            .with_entity(&entity.entity_id)
            .with_session(session_id)
            .with_metadata(json!({
                "entity_type": entity.entity_type.as_str(),
                "source_url": entity.source_url,
                "risk_level": entity.risk_level.as_str(),
                "trust_score": entity.trust_score,
            }));
        self.persistence.record_audit_event(&event);

        info!(
            entity_id = %entity.entity_id,
            kind = entity.entity_type.as_str(),
            risk = entity.risk_level.as_str(),
            score = entity.trust_score,
            "entity detected"
        );
        self.publish(PipelineEvent::EntityDetected(entity.clone()));
        Ok(entity)
    }

    fn record_failure(&self, capture: &Capture, session_id: &str, error: &GatewayError) {
        warn!(url = capture.source_locator(), error = %error, "analysis failed");
        let kind = capture.kind();
        let event = AuditEvent::new(AuditEventType::AnalysisFailed)
            .with_session(session_id)
            .with_metadata(json!({
                "source_url": capture.source_locator(),
                "kind": kind.entity_type().as_str(),
                "error": error.to_string(),
            }));
        self.persistence.record_audit_event(&event);
        self.publish(PipelineEvent::AnalysisFailed {
            source_url: capture.source_locator().to_string(),
            kind,
            error: error.to_string(),
        });
    }

    /// Process in the background so observation can continue.
    pub fn submit(&self, capture: Capture, session_id: impl Into<String>) -> JoinHandle<Result<Entity, PipelineError>> {
        let pipeline = self.clone();
        let session_id = session_id.into();
        tokio::spawn(async move { pipeline.process(capture, &session_id).await })
    }

    /// Drain a capture stream, processing captures concurrently, until the
    /// sender closes. Returns the number of entities produced.
    pub async fn consume(&self, mut captures: mpsc::Receiver<Capture>, session_id: &str) -> usize {
        let mut in_flight = JoinSet::new();
        while let Some(capture) = captures.recv().await {
            let pipeline = self.clone();
            let session_id = session_id.to_string();
            in_flight.spawn(async move { pipeline.process(capture, &session_id).await });
        }

        let mut detected = 0;
        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(Ok(_)) => detected += 1,
                Ok(Err(e)) => debug!(error = %e, "capture not analyzed"),
                Err(e) => warn!(error = %e, "analysis task aborted"),
            }
        }
        detected
    }

    /// Validate and analyze a single URL on request.
    ///
    /// Invalid input is rejected before anything is recorded.
    pub async fn analyze_manual(&self, request: ManualRequest, session_id: Option<&str>) -> Result<Entity, PipelineError> {
        let session_id = session_or_default(session_id);
        let capture = Self::manual_capture(request)?;

        let event = AuditEvent::new(AuditEventType::ManualAnalysisRequested)
            .with_session(&session_id)
            .with_metadata(json!({
                "source_url": capture.source_locator(),
                "kind": capture.kind().entity_type().as_str(),
            }));
        self.persistence.record_audit_event(&event);

        self.process(capture, &session_id).await
    }

    fn manual_capture(request: ManualRequest) -> Result<Capture, PipelineError> {
        let url = normalize_locator(&request.url)
            .ok_or_else(|| PipelineError::InvalidLocator(request.url.clone()))?;

        if let Some(text) = request.text.filter(|t| !t.trim().is_empty()) {
            return Ok(Capture::text(url, request.title.unwrap_or_default(), text));
        }
        match classify_url(&url) {
            EntityType::Image => Ok(Capture::image(url)),
            EntityType::Text | EntityType::News => Err(PipelineError::MissingText(url)),
            EntityType::Unknown => Err(PipelineError::Unsupported(url)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::{MockImageAnalyzer, MockTextAnalyzer};
    use crate::gateway::{AnalyzerResult, FallbackChain, ProviderError};
    use crate::storage::{OpenStore, SqliteStore};

    fn pipeline(image: MockImageAnalyzer) -> MonitorPipeline {
        let gateway = AnalysisGateway::new(
            Arc::new(image),
            Arc::new(MockTextAnalyzer::returning(
                AnalyzerResult::new("heuristic").with_ai_generated_probability(0.3),
            )),
            FallbackChain::empty(),
        );
        MonitorPipeline::new(
            gateway,
            Arc::new(TrustScoreEngine::new()),
            Persistence::new(Arc::new(SqliteStore::open_in_memory().unwrap())),
        )
    }

    #[tokio::test]
    async fn process_persists_and_publishes() {
        let p = pipeline(MockImageAnalyzer::returning(
            AnalyzerResult::new("img").with_fake_probability(0.8),
        ));
        let mut events = p.subscribe();

        let entity = p.process(Capture::image("https://cdn.test/a.png"), "s1").await.unwrap();
        assert_eq!(entity.trust_score, 20.0);

        match events.recv().await.unwrap() {
            PipelineEvent::EntityDetected(e) => assert_eq!(e.entity_id, entity.entity_id),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(p.persistence().entity(&entity.entity_id).unwrap().is_some());
        assert_eq!(p.persistence().trust_history(&entity.entity_id).unwrap().len(), 1);
        let audit = p.persistence().audit_tail(5).unwrap();
        assert_eq!(audit[0].event_type, AuditEventType::EntityDetected);
    }

    #[tokio::test]
    async fn gateway_failure_records_analysis_failed() {
        let p = pipeline(MockImageAnalyzer::failing(ProviderError::Status(502)));
        let mut events = p.subscribe();

        let err = p.process(Capture::image("https://cdn.test/a.png"), "s1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Gateway(_)));

        assert!(matches!(events.recv().await.unwrap(), PipelineEvent::AnalysisFailed { .. }));
        let audit = p.persistence().audit_tail(5).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, AuditEventType::AnalysisFailed);
        assert_eq!(audit[0].metadata["kind"], "IMAGE");
        assert!(p.persistence().list_entities(&Default::default()).unwrap().entities.is_empty());
        assert_eq!(p.trust().score("s1"), 100.0);
    }

    #[tokio::test]
    async fn manual_request_validation_has_no_side_effects() {
        let p = pipeline(MockImageAnalyzer::returning(AnalyzerResult::new("img")));
        let bad = ManualRequest {
            url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(
            p.analyze_manual(bad, None).await,
            Err(PipelineError::InvalidLocator(_))
        ));
        let video = ManualRequest {
            url: "https://video.test/clip.mp4".into(),
            ..Default::default()
        };
        assert!(matches!(
            p.analyze_manual(video, None).await,
            Err(PipelineError::Unsupported(_))
        ));
        assert!(p.persistence().audit_tail(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_text_analysis_is_audited() {
        let p = pipeline(MockImageAnalyzer::returning(AnalyzerResult::new("img")));
        let request = ManualRequest {
            url: "https://news.test/story".into(),
            title: Some("Story".into()),
            text: Some("some pasted article text".into()),
        };
        let entity = p.analyze_manual(request, Some("s9")).await.unwrap();
        assert_eq!(entity.entity_type, EntityType::Text);
        assert_eq!(entity.trust_score, 70.0);

        let types: Vec<_> = p
            .persistence()
            .audit_tail(10)
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert!(types.contains(&AuditEventType::ManualAnalysisRequested));
        assert!(types.contains(&AuditEventType::EntityDetected));
    }

    #[tokio::test]
    async fn consume_drains_capture_stream() {
        let p = pipeline(MockImageAnalyzer::returning(
            AnalyzerResult::new("img").with_fake_probability(0.1),
        ));
        let (tx, rx) = mpsc::channel(8);
        for i in 0..3 {
            tx.send(Capture::image(format!("https://cdn.test/{}.png", i))).await.unwrap();
        }
        drop(tx);
        assert_eq!(p.consume(rx, "s1").await, 3);
        assert_eq!(p.trust().score("s1"), 70.0);
    }

    #[tokio::test]
    async fn submit_runs_in_background() {
        let p = pipeline(MockImageAnalyzer::returning(AnalyzerResult::new("img")));
        let handle = p.submit(Capture::image("https://cdn.test/z.png"), "s1");
        let entity = handle.await.unwrap().unwrap();
        assert_eq!(entity.trust_score_delta, 0.0);
    }
}
