//! Mock analyzers and providers returning preconfigured responses
//!
//! Used by tests and by the CLI's `--offline` mode, where no analyzer
//! endpoints are reachable.

use super::provider::{ChatMessage, CompletionProvider, ProviderError, ProviderKind};
use super::result::AnalyzerResult;
use super::{ImageAnalysisRequest, ImageAnalyzer, TextAnalysisRequest, TextAnalyzer};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Image analyzer with a fixed outcome
pub struct MockImageAnalyzer {
    outcome: Result<AnalyzerResult, ProviderError>,
    calls: AtomicUsize,
}

impl MockImageAnalyzer {
    pub fn returning(result: AnalyzerResult) -> Self {
        Self {
            outcome: Ok(result),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of analyze calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAnalyzer for MockImageAnalyzer {
    fn name(&self) -> &str {
        "mock-image"
    }

    async fn analyze(&self, _request: &ImageAnalysisRequest) -> Result<AnalyzerResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

/// Text analyzer with a fixed outcome and optional latency
pub struct MockTextAnalyzer {
    outcome: Result<AnalyzerResult, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockTextAnalyzer {
    pub fn returning(result: AnalyzerResult) -> Self {
        Self {
            outcome: Ok(result),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextAnalyzer for MockTextAnalyzer {
    fn name(&self) -> &str {
        "mock-text"
    }

    async fn analyze(&self, _request: &TextAnalysisRequest) -> Result<AnalyzerResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Completion provider with a fixed reply or failure
pub struct MockCompletionProvider {
    name: String,
    kind: ProviderKind,
    outcome: Result<String, ProviderError>,
    delay: Option<Duration>,
    last_messages: Mutex<Vec<ChatMessage>>,
    calls: AtomicUsize,
}

impl MockCompletionProvider {
    pub fn replying(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::with_outcome(name, Ok(reply.into()))
    }

    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self::with_outcome(name, Err(error))
    }

    fn with_outcome(name: impl Into<String>, outcome: Result<String, ProviderError>) -> Self {
        Self {
            name: name.into(),
            kind: ProviderKind::OpenAi,
            outcome,
            delay: None,
            last_messages: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Messages received by the most recent call.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
