//! YAML configuration for the monitor
//!
//! Every section has serde defaults, so an empty or missing file yields a
//! working offline-capable configuration. API keys are never stored in the
//! file; each provider names the environment variable holding its key.

use crate::capture::ExtractionTimer;
use crate::gateway::{
    AnalysisGateway, CompletionProvider, FallbackChain, HttpCompletionProvider, HttpImageAnalyzer,
    HttpTextAnalyzer, ProviderError, ProviderKind, DEFAULT_PRIMARY_TIMEOUT, MAX_ATTEMPT_TIMEOUT,
};
use crate::model::DEFAULT_SESSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Accepted range for primary analyzer timeouts, in seconds.
pub const PRIMARY_TIMEOUT_RANGE: (u64, u64) = (8, 30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to build provider: {0}")]
    Provider(#[from] ProviderError),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default = "default_session")]
    pub session_id: String,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub analyzers: AnalyzerConfig,
    #[serde(default)]
    pub enrichment: ChainConfig,
    #[serde(default)]
    pub advisory: ChainConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
    #[serde(default = "default_ceiling_ms")]
    pub ceiling_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_image_endpoint")]
    pub image_endpoint: String,
    #[serde(default = "default_text_endpoint")]
    pub text_endpoint: String,
    /// Per-call timeout for both primary analyzers
    #[serde(default = "default_primary_timeout_secs")]
    pub timeout_secs: u64,
}

/// An ordered provider chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Per-attempt timeout, capped at 40 seconds
    #[serde(default = "default_chain_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    /// Base URL of the OpenAI-compatible API
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_session() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_quiet_period_ms() -> u64 {
    1500
}

fn default_ceiling_ms() -> u64 {
    8000
}

fn default_image_endpoint() -> String {
    "http://127.0.0.1:8000/analyze/image".to_string()
}

fn default_text_endpoint() -> String {
    "http://127.0.0.1:8000/analyze/text".to_string()
}

fn default_primary_timeout_secs() -> u64 {
    DEFAULT_PRIMARY_TIMEOUT.as_secs()
}

fn default_chain_timeout_secs() -> u64 {
    MAX_ATTEMPT_TIMEOUT.as_secs()
}

fn default_temperature() -> f32 {
    0.2
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            database: None,
            session_id: default_session(),
            capture: CaptureConfig::default(),
            analyzers: AnalyzerConfig::default(),
            enrichment: ChainConfig::default(),
            advisory: ChainConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            ceiling_ms: default_ceiling_ms(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            image_endpoint: default_image_endpoint(),
            text_endpoint: default_text_endpoint(),
            timeout_secs: default_primary_timeout_secs(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_chain_timeout_secs(),
            providers: Vec::new(),
        }
    }
}

/// `<data dir>/entityx/entityx.db`
pub fn default_database_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("entityx").join("entityx.db")
}

impl MonitorConfig {
    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_yaml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(default_database_path)
    }

    pub fn extraction_timer(&self) -> ExtractionTimer {
        ExtractionTimer::new(
            Duration::from_millis(self.capture.quiet_period_ms),
            Duration::from_millis(self.capture.ceiling_ms),
        )
    }

    /// Primary timeout clamped into the accepted range.
    pub fn primary_timeout(&self) -> Duration {
        let (lo, hi) = PRIMARY_TIMEOUT_RANGE;
        Duration::from_secs(self.analyzers.timeout_secs.clamp(lo, hi))
    }

    pub fn build_gateway(&self) -> Result<AnalysisGateway, ConfigError> {
        let gateway = AnalysisGateway::new(
            Arc::new(HttpImageAnalyzer::new(&self.analyzers.image_endpoint)?),
            Arc::new(HttpTextAnalyzer::new(&self.analyzers.text_endpoint)?),
            self.enrichment.build()?,
        )
        .with_primary_timeout(self.primary_timeout());
        Ok(gateway)
    }

    pub fn build_advisory_chain(&self) -> Result<FallbackChain, ConfigError> {
        self.advisory.build()
    }
}

impl ChainConfig {
    /// Build the chain from providers whose API key is available.
    pub fn build(&self) -> Result<FallbackChain, ConfigError> {
        let mut providers: Vec<Arc<dyn CompletionProvider>> = Vec::new();
        for p in &self.providers {
            let api_key = match p.api_key_env.as_deref() {
                Some(var) => match std::env::var(var) {
                    Ok(key) if !key.trim().is_empty() => Some(key),
                    _ => {
                        warn!(provider = %p.name, env = var, "API key not set, skipping provider");
                        continue;
                    }
                },
                None => None,
            };
            let provider = HttpCompletionProvider::new(&p.name, p.kind, &p.endpoint, &p.model)?
                .with_api_key(api_key)
                .with_temperature(p.temperature);
            providers.push(Arc::new(provider));
        }
        Ok(FallbackChain::new(
            providers,
            Duration::from_secs(self.timeout_secs),
        ))
    }
}
