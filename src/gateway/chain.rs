//! Ordered fallback over interchangeable completion providers

use super::provider::{prepare_messages, ChatMessage, CompletionProvider, ProviderError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Upper bound on any single attempt in a chain.
pub const MAX_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(40);

/// Successful chain output with the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput<T> {
    pub provider: String,
    pub value: T,
}

/// Every provider failed; one entry per attempt, in order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("all {} providers failed", .attempts.len())]
pub struct ChainExhausted {
    pub attempts: Vec<(String, ProviderError)>,
}

/// Ordered list of providers tried in sequence until one succeeds.
///
/// Each attempt is bounded by the chain timeout; a timeout counts as a
/// failed attempt and the local wait is abandoned.
#[derive(Clone)]
pub struct FallbackChain {
    providers: Vec<Arc<dyn CompletionProvider>>,
    attempt_timeout: Duration,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn CompletionProvider>>, attempt_timeout: Duration) -> Self {
        Self {
            providers,
            attempt_timeout: attempt_timeout.min(MAX_ATTEMPT_TIMEOUT),
        }
    }

    /// A chain with no providers. Every call is immediately exhausted.
    pub fn empty() -> Self {
        Self::new(Vec::new(), MAX_ATTEMPT_TIMEOUT)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First non-empty text response.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChainOutput<String>, ChainExhausted> {
        self.complete_with(messages, |text| Ok(text.to_string())).await
    }

    /// First response that is non-empty and accepted by `parse`.
    ///
    /// A parse error is treated exactly like a provider error: the next
    /// provider is tried.
    pub async fn complete_with<T, F>(
        &self,
        messages: &[ChatMessage],
        parse: F,
    ) -> Result<ChainOutput<T>, ChainExhausted>
    where
        F: Fn(&str) -> Result<T, ProviderError>,
    {
        let mut attempts = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let prepared = prepare_messages(provider.kind(), messages);
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, provider.complete(&prepared)).await {
                    Ok(Ok(text)) if text.trim().is_empty() => Err(ProviderError::EmptyOutput),
                    Ok(Ok(text)) => parse(&text),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(ProviderError::Timeout(self.attempt_timeout)),
                };

            match outcome {
                Ok(value) => {
                    debug!(provider = provider.name(), "provider answered");
                    return Ok(ChainOutput {
                        provider: provider.name().to_string(),
                        value,
                    });
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "provider failed, falling back");
                    attempts.push((provider.name().to_string(), e));
                }
            }
        }

        Err(ChainExhausted { attempts })
    }
}
