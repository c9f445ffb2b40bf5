//! Advisory service: legal-awareness chat and complaint drafting
//!
//! Both flows run the advisory fallback chain for free-form text. A
//! successful reply is stored as an [`AdvisorySession`] and audited.

use crate::export::evidence_lines;
use crate::gateway::{ChatMessage, FallbackChain};
use crate::model::{
    session_or_default, AdvisorySession, AuditEvent, AuditEventType, Entity, SessionType,
};
use crate::storage::Persistence;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

const CHAT_INSTRUCTION: &str = "You provide general legal awareness about AI-generated content, \
manipulated media, misinformation and online impersonation. Do not give legal advice, do not \
accuse anyone and do not state that any content is illegal. Use cautious language, keep answers \
structured and brief, and end with a reminder to consult a qualified legal professional.";

const DRAFT_INSTRUCTION: &str = "You draft neutral, factual complaint text for reporting \
suspected AI-generated or manipulated content to a platform or authority. Describe only the \
evidence provided, make no accusations and leave placeholders for the complainant's details.";

/// A user question, optionally about a specific entity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisoryRequest {
    pub query: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Serializes as `{"answer", "provider"}` or `{"error"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdvisoryReply {
    Answer { answer: String, provider: String },
    Error { error: String },
}

impl AdvisoryReply {
    fn error(message: impl Into<String>) -> Self {
        AdvisoryReply::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AdvisoryReply::Error { .. })
    }
}

pub struct AdvisoryService {
    chain: FallbackChain,
    persistence: Persistence,
}

impl AdvisoryService {
    pub fn new(chain: FallbackChain, persistence: Persistence) -> Self {
        Self { chain, persistence }
    }

    /// Answer a legal-awareness question.
    pub async fn ask(&self, request: AdvisoryRequest) -> AdvisoryReply {
        let query = request.query.trim();
        if query.is_empty() {
            return AdvisoryReply::error("query must not be empty");
        }

        let entity = request
            .entity_id
            .as_deref()
            .and_then(|id| self.lookup(id));
        let mut system = CHAT_INSTRUCTION.to_string();
        if let Some(ref entity) = entity {
            system.push_str("\n\n");
            system.push_str(&entity_context(entity));
        }

        let messages = [ChatMessage::system(system), ChatMessage::user(query)];
        self.run(
            &messages,
            SessionType::LegalChat,
            query,
            request.entity_id,
            request.session_id.as_deref(),
        )
        .await
    }

    /// Draft a complaint about a stored entity.
    pub async fn draft_complaint(&self, entity_id: &str, session_id: Option<&str>) -> AdvisoryReply {
        let Some(entity) = self.lookup(entity_id) else {
            return AdvisoryReply::error(format!("entity not found: {}", entity_id));
        };

        let user_query = format!("Draft a complaint regarding entity {}", entity_id);
        let messages = [
            ChatMessage::system(DRAFT_INSTRUCTION),
            ChatMessage::user(format!("{}\n\n{}", user_query, entity_context(&entity))),
        ];
        self.run(
            &messages,
            SessionType::ComplaintDraft,
            &user_query,
            Some(entity_id.to_string()),
            session_id,
        )
        .await
    }

    fn lookup(&self, entity_id: &str) -> Option<Entity> {
        self.persistence
            .entity(entity_id)
            .map_err(|e| warn!(entity_id, error = %e, "entity lookup failed"))
            .ok()
            .flatten()
    }

    async fn run(
        &self,
        messages: &[ChatMessage],
        session_type: SessionType,
        user_query: &str,
        entity_id: Option<String>,
        session_id: Option<&str>,
    ) -> AdvisoryReply {
        if self.chain.is_empty() {
            return AdvisoryReply::error("no advisory providers configured");
        }
        let output = match self.chain.complete(messages).await {
            Ok(output) => output,
            Err(exhausted) => {
                warn!(session_type = session_type.as_str(), "{}", exhausted);
                return AdvisoryReply::error("advisory service unavailable, try again later");
            }
        };

        self.persistence.record_advisory_session(&AdvisorySession {
            entity_id: entity_id.clone(),
            user_query: user_query.to_string(),
            ai_response: output.value.clone(),
            session_type,
            provider: Some(output.provider.clone()),
            timestamp: Utc::now(),
        });

        let mut event = AuditEvent::new(AuditEventType::AdvisoryChatUsed)
            .with_session(session_or_default(session_id))
            .with_metadata(json!({
                "session_type": session_type.as_str(),
                "provider": output.provider,
            }));
        if let Some(id) = entity_id {
            event = event.with_entity(id);
        }
        self.persistence.record_audit_event(&event);

        info!(provider = %output.provider, session_type = session_type.as_str(), "advisory reply");
        AdvisoryReply::Answer {
            answer: output.value,
            provider: output.provider,
        }
    }
}

/// Evidence summary handed to the model alongside the user's request.
fn entity_context(entity: &Entity) -> String {
    let mut context = format!(
        "Content under discussion: {} at {}",
        entity.entity_type, entity.source_url
    );
    if let Some(ref title) = entity.title {
        context.push_str(&format!(" titled \"{}\"", title));
    }
    context.push_str(".\nEvidence:\n");
    context.push_str(&evidence_lines(entity).join("\n"));
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockCompletionProvider;
    use crate::gateway::{CompletionProvider, ProviderError};
    use crate::model::{EntityAnalysis, EntityType, RiskLevel};
    use crate::storage::{OpenStore, SqliteStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn service(providers: Vec<Arc<MockCompletionProvider>>) -> AdvisoryService {
        let persistence = Persistence::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
        persistence.record_entity(&Entity {
            entity_id: "e1".into(),
            entity_type: EntityType::Image,
            source_url: "https://cdn.test/a.png".into(),
            title: None,
            extracted_text: None,
            risk_level: RiskLevel::High,
            analysis: EntityAnalysis {
                fake_probability: Some(0.9),
                primary_provider: "img".into(),
                ..Default::default()
            },
            detected_at: Utc::now(),
            analyzed_at: Utc::now(),
            trust_score: 10.0,
            trust_score_delta: -90.0,
            session_id: "s".into(),
        });
        let chain = FallbackChain::new(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn CompletionProvider>)
                .collect(),
            Duration::from_secs(5),
        );
        AdvisoryService::new(chain, persistence)
    }

    #[tokio::test]
    async fn empty_query_rejected_without_side_effects() {
        let provider = Arc::new(MockCompletionProvider::replying("groq", "answer"));
        let svc = service(vec![provider.clone()]);
        let reply = svc
            .ask(AdvisoryRequest {
                query: "   ".into(),
                ..Default::default()
            })
            .await;
        assert!(reply.is_error());
        assert_eq!(provider.calls(), 0);
        assert!(svc.persistence.advisory_tail(10).unwrap().is_empty());
        assert!(svc.persistence.audit_tail(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn answer_is_persisted_with_provider() {
        let svc = service(vec![
            Arc::new(MockCompletionProvider::failing("groq", ProviderError::Status(429))),
            Arc::new(MockCompletionProvider::replying("openrouter", "General awareness text")),
        ]);
        let reply = svc
            .ask(AdvisoryRequest {
                query: "What can I do about this image?".into(),
                entity_id: Some("e1".into()),
                session_id: Some("s".into()),
            })
            .await;
        assert_eq!(
            reply,
            AdvisoryReply::Answer {
                answer: "General awareness text".into(),
                provider: "openrouter".into(),
            }
        );

        let history = svc.persistence.advisory_history("e1").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].provider.as_deref(), Some("openrouter"));
        assert_eq!(history[0].session_type, SessionType::LegalChat);
        let audit = svc.persistence.audit_tail(10).unwrap();
        assert_eq!(audit[0].event_type, AuditEventType::AdvisoryChatUsed);
    }

    #[tokio::test]
    async fn entity_evidence_is_sent_as_context() {
        let provider = Arc::new(MockCompletionProvider::replying("groq", "ok"));
        let svc = service(vec![provider.clone()]);
        svc.ask(AdvisoryRequest {
            query: "Is this a deepfake?".into(),
            entity_id: Some("e1".into()),
            session_id: None,
        })
        .await;
        let messages = provider.last_messages();
        assert!(messages[0].content.contains("https://cdn.test/a.png"));
        assert!(messages[0].content.contains("90%"));
    }

    #[tokio::test]
    async fn exhausted_chain_is_an_error_reply() {
        let svc = service(vec![
            Arc::new(MockCompletionProvider::failing("a", ProviderError::Status(429))),
            Arc::new(MockCompletionProvider::failing("b", ProviderError::EmptyOutput)),
        ]);
        let reply = svc
            .ask(AdvisoryRequest {
                query: "hello".into(),
                ..Default::default()
            })
            .await;
        assert!(reply.is_error());
        assert!(svc.persistence.advisory_tail(10).unwrap().is_empty());

        let json = serde_json::to_value(&reply).unwrap();
        assert!(json.get("error").is_some());
        assert!(json.get("answer").is_none());
    }

    #[tokio::test]
    async fn draft_requires_known_entity() {
        let svc = service(vec![Arc::new(MockCompletionProvider::replying("groq", "Draft"))]);
        assert!(svc.draft_complaint("ghost", None).await.is_error());

        let reply = svc.draft_complaint("e1", None).await;
        assert!(!reply.is_error());
        let history = svc.persistence.advisory_history("e1").unwrap();
        assert_eq!(history[0].session_type, SessionType::ComplaintDraft);
    }
}
