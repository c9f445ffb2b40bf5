//! reqwest-backed analyzers and OpenAI-compatible completion providers

use super::normalize::{ImageAnalyzerResponse, TextAnalyzerResponse};
use super::provider::{ChatMessage, CompletionProvider, ProviderError, ProviderKind};
use super::result::AnalyzerResult;
use super::{ImageAnalysisRequest, ImageAnalyzer, TextAnalysisRequest, TextAnalyzer};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const USER_AGENT: &str = concat!("entityx/", env!("CARGO_PKG_VERSION"));

fn build_client() -> Result<Client, ProviderError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::Transport(e.to_string()))
}

fn transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport(e.to_string())
}

/// POST a JSON body and decode a JSON reply, mapping non-2xx to [`ProviderError::Status`].
async fn post_json<B, R>(client: &Client, url: &str, bearer: Option<&str>, body: &B) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: for<'de> Deserialize<'de>,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = bearer {
        request = request.bearer_auth(key);
    }
    let resp = request.send().await.map_err(transport)?;

    let status = resp.status();
    if !status.is_success() {
        debug!(url, status = status.as_u16(), "non-success response");
        return Err(ProviderError::Status(status.as_u16()));
    }

    resp.json::<R>()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Image analyzer service reached over HTTP
pub struct HttpImageAnalyzer {
    endpoint: String,
    client: Client,
}

impl HttpImageAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_client()?,
        })
    }
}

#[async_trait]
impl ImageAnalyzer for HttpImageAnalyzer {
    fn name(&self) -> &str {
        "image-analyzer"
    }

    async fn analyze(&self, request: &ImageAnalysisRequest) -> Result<AnalyzerResult, ProviderError> {
        let body: ImageAnalyzerResponse = post_json(&self.client, &self.endpoint, None, request).await?;
        Ok(body.into_result(self.name()))
    }
}

/// Primary text analyzer service reached over HTTP
pub struct HttpTextAnalyzer {
    endpoint: String,
    client: Client,
}

impl HttpTextAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: build_client()?,
        })
    }
}

#[async_trait]
impl TextAnalyzer for HttpTextAnalyzer {
    fn name(&self) -> &str {
        "text-analyzer"
    }

    async fn analyze(&self, request: &TextAnalysisRequest) -> Result<AnalyzerResult, ProviderError> {
        let body: TextAnalyzerResponse = post_json(&self.client, &self.endpoint, None, request).await?;
        Ok(body.into_result(self.name()))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

/// OpenAI-compatible `/chat/completions` reply. Providers may return HTTP 200
/// with an `error` object instead of choices.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_text(self) -> Result<String, ProviderError> {
        if let Some(error) = self.error {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ProviderError::Provider(message));
        }
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyOutput);
        }
        Ok(text)
    }
}

/// Chat-completion provider speaking the OpenAI-compatible protocol
pub struct HttpCompletionProvider {
    name: String,
    kind: ProviderKind,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    client: Client,
}

impl HttpCompletionProvider {
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            name: name.into(),
            kind,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            temperature: 0.2,
            client: build_client()?,
        })
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{}/chat/completions", base)
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let reply: CompletionResponse = post_json(
            &self.client,
            &self.completions_url(),
            self.api_key.as_deref(),
            &body,
        )
        .await?;
        reply.into_text()
    }
}
