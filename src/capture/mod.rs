//! Capture layer: turns raw surface events into deduplicated captures
//!
//! - `dedup`: per-epoch image suppression and per-session article suppression
//! - `extract`: boilerplate stripping and word thresholds for article text
//! - `debounce`: soft/hard timer pair that decides when to extract
//! - `surface`: async driver consuming surface events

mod debounce;
mod dedup;
mod extract;
mod surface;

pub use debounce::{ExtractionTimer, DEFAULT_CEILING, DEFAULT_QUIET_PERIOD};
pub use dedup::CaptureDeduplicator;
pub use extract::{extract_article, ArticleExtraction, MAX_ARTICLE_WORDS, MIN_ARTICLE_WORDS};
pub use surface::{SurfaceEvent, SurfaceMonitor};

use crate::model::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capture kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaptureKind {
    Image,
    Text,
}

impl CaptureKind {
    pub fn entity_type(&self) -> EntityType {
        match self {
            CaptureKind::Image => EntityType::Image,
            CaptureKind::Text => EntityType::Text,
        }
    }
}

/// An image observed on the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageCapture {
    pub source_locator: String,
    pub observed_at: DateTime<Utc>,
}

impl ImageCapture {
    pub fn new(source_locator: impl Into<String>) -> Self {
        Self {
            source_locator: source_locator.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Article text extracted from a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextCapture {
    pub source_locator: String,
    pub title: String,
    pub raw_text: String,
    pub word_count: usize,
    pub observed_at: DateTime<Utc>,
}

impl TextCapture {
    pub fn new(
        source_locator: impl Into<String>,
        title: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        let raw_text = raw_text.into();
        Self {
            source_locator: source_locator.into(),
            title: title.into(),
            word_count: raw_text.split_whitespace().count(),
            raw_text,
            observed_at: Utc::now(),
        }
    }
}

/// A candidate unit of content awaiting analysis. Transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Capture {
    Image(ImageCapture),
    Text(TextCapture),
}

impl Capture {
    pub fn image(source_locator: impl Into<String>) -> Self {
        Capture::Image(ImageCapture::new(source_locator))
    }

    pub fn text(
        source_locator: impl Into<String>,
        title: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Capture::Text(TextCapture::new(source_locator, title, raw_text))
    }

    pub fn kind(&self) -> CaptureKind {
        match self {
            Capture::Image(_) => CaptureKind::Image,
            Capture::Text(_) => CaptureKind::Text,
        }
    }

    pub fn source_locator(&self) -> &str {
        match self {
            Capture::Image(c) => &c.source_locator,
            Capture::Text(c) => &c.source_locator,
        }
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        match self {
            Capture::Image(c) => c.observed_at,
            Capture::Text(c) => c.observed_at,
        }
    }
}

/// Parse and validate a surface locator. Only http(s) URLs with a host qualify.
pub fn normalize_locator(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = url::Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.to_string())
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff", "tif", "avif", "heic",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "flv", "wmv", "m4v", "3gp",
];

const NEWS_DOMAINS: &[&str] = &[
    "bbc.", "reuters.", "apnews.", "nytimes.", "theguardian.",
    "washingtonpost.", "cnn.", "foxnews.", "nbcnews.", "huffpost.",
];

/// Route a manually supplied URL to a content kind.
///
/// Known image extensions are IMAGE; no extension or a known news domain is
/// TEXT; anything else (video, documents) is UNKNOWN.
pub fn classify_url(raw: &str) -> EntityType {
    let Ok(parsed) = url::Url::parse(&raw.trim().to_lowercase()) else {
        return EntityType::Unknown;
    };
    let last_segment = parsed.path().rsplit('/').next().unwrap_or("");
    let ext = last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("");

    if IMAGE_EXTENSIONS.contains(&ext) {
        return EntityType::Image;
    }
    if VIDEO_EXTENSIONS.contains(&ext) {
        return EntityType::Unknown;
    }
    let host = parsed.host_str().unwrap_or("");
    if NEWS_DOMAINS.iter().any(|d| host.contains(d)) || ext.is_empty() {
        return EntityType::Text;
    }
    EntityType::Unknown
}
