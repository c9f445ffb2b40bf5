//! Analysis gateway: fans a capture out to external analyzers
//!
//! Images go to a single image analyzer. Article text goes to the primary
//! text analyzer and, concurrently, to the enrichment fallback chain. Only
//! a primary failure fails the capture; an exhausted enrichment chain just
//! means "no enrichment".

mod chain;
mod http;
pub mod mock;
mod normalize;
mod provider;
mod result;

pub use chain::{ChainExhausted, ChainOutput, FallbackChain, MAX_ATTEMPT_TIMEOUT};
pub use http::{HttpCompletionProvider, HttpImageAnalyzer, HttpTextAnalyzer};
pub use normalize::{
    enrichment_messages, extract_json, parse_enrichment, EnrichmentPayload, ImageAnalyzerResponse,
    TextAnalyzerResponse,
};
pub use provider::{prepare_messages, ChatMessage, CompletionProvider, ProviderError, ProviderKind, Role};
pub use result::{clamp_probability, AnalyzerResult, MAX_FINDINGS};

use crate::capture::{Capture, ImageCapture, TextCapture};
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for primary analyzer calls.
pub const DEFAULT_PRIMARY_TIMEOUT: Duration = Duration::from_secs(15);

/// Request body sent to the image analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAnalysisRequest {
    pub image_url: String,
    pub session_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Request body sent to the primary text analyzer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextAnalysisRequest {
    pub title: String,
    pub url: String,
    pub text: String,
    pub word_count: usize,
    pub timestamp: i64,
    pub session_id: String,
}

impl ImageAnalysisRequest {
    pub fn from_capture(capture: &ImageCapture, session_id: &str) -> Self {
        Self {
            image_url: capture.source_locator.clone(),
            session_id: session_id.to_string(),
            timestamp: capture.observed_at.timestamp_millis(),
        }
    }
}

impl TextAnalysisRequest {
    pub fn from_capture(capture: &TextCapture, session_id: &str) -> Self {
        Self {
            title: capture.title.clone(),
            url: capture.source_locator.clone(),
            text: capture.raw_text.clone(),
            word_count: capture.word_count,
            timestamp: capture.observed_at.timestamp_millis(),
            session_id: session_id.to_string(),
        }
    }
}

/// Image analyzer contract (single provider, no fallback)
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, request: &ImageAnalysisRequest) -> Result<AnalyzerResult, ProviderError>;
}

/// Primary heuristic text analyzer contract
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, request: &TextAnalysisRequest) -> Result<AnalyzerResult, ProviderError>;
}

/// Terminal gateway failure for one capture
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("primary analyzer '{analyzer}' failed: {source}")]
    PrimaryFailed {
        analyzer: String,
        source: ProviderError,
    },
}

/// Primary result plus optional enrichment for one capture
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOutput {
    pub primary: AnalyzerResult,
    pub enrichment: Option<AnalyzerResult>,
}

/// Converts captures into normalized analyzer results
#[derive(Clone)]
pub struct AnalysisGateway {
    image: Arc<dyn ImageAnalyzer>,
    text: Arc<dyn TextAnalyzer>,
    enrichment: FallbackChain,
    primary_timeout: Duration,
}

impl AnalysisGateway {
    pub fn new(
        image: Arc<dyn ImageAnalyzer>,
        text: Arc<dyn TextAnalyzer>,
        enrichment: FallbackChain,
    ) -> Self {
        Self {
            image,
            text,
            enrichment,
            primary_timeout: DEFAULT_PRIMARY_TIMEOUT,
        }
    }

    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = timeout;
        self
    }

    /// Analyze one capture.
    ///
    /// For text, primary and enrichment run concurrently and both settle
    /// before this returns.
    pub async fn analyze(
        &self,
        capture: &Capture,
        session_id: &str,
    ) -> Result<GatewayOutput, GatewayError> {
        match capture {
            Capture::Image(image) => {
                let request = ImageAnalysisRequest::from_capture(image, session_id);
                let primary = self
                    .call_primary(self.image.name(), self.image.analyze(&request))
                    .await?;
                Ok(GatewayOutput {
                    primary,
                    enrichment: None,
                })
            }
            Capture::Text(text) => {
                let request = TextAnalysisRequest::from_capture(text, session_id);
                let (primary, enrichment) = tokio::join!(
                    self.call_primary(self.text.name(), self.text.analyze(&request)),
                    self.enrich(text),
                );
                Ok(GatewayOutput {
                    primary: primary?,
                    enrichment,
                })
            }
        }
    }

    async fn call_primary<F>(&self, analyzer: &str, call: F) -> Result<AnalyzerResult, GatewayError>
    where
        F: Future<Output = Result<AnalyzerResult, ProviderError>>,
    {
        let outcome = match tokio::time::timeout(self.primary_timeout, call).await {
            Ok(Ok(result)) => Ok(result.normalized()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(self.primary_timeout)),
        };
        outcome.map_err(|source| {
            warn!(analyzer, error = %source, "primary analyzer failed");
            GatewayError::PrimaryFailed {
                analyzer: analyzer.to_string(),
                source,
            }
        })
    }

    /// Best-effort enrichment. Exhaustion yields `None`.
    async fn enrich(&self, capture: &TextCapture) -> Option<AnalyzerResult> {
        if self.enrichment.is_empty() {
            debug!("no enrichment providers configured");
            return None;
        }
        let messages = enrichment_messages(capture);
        match self.enrichment.complete_with(&messages, parse_enrichment).await {
            Ok(out) => {
                info!(provider = %out.provider, url = %capture.source_locator, "enrichment received");
                Some(out.value.into_result(&out.provider))
            }
            Err(exhausted) => {
                info!(url = %capture.source_locator, "{}; continuing without enrichment", exhausted);
                None
            }
        }
    }
}
