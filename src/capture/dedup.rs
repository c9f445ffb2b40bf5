//! Repeat suppression for surface captures

use super::extract::ArticleExtraction;
use super::{normalize_locator, Capture};
use std::collections::HashSet;
use tracing::debug;

/// Tracks what has already been reported.
///
/// Image locators are suppressed within one navigation epoch only. Article
/// pages are suppressed for the lifetime of the deduplicator (one session).
#[derive(Debug, Default)]
pub struct CaptureDeduplicator {
    epoch: u64,
    current_page: Option<String>,
    seen_images: HashSet<String>,
    analyzed_pages: HashSet<String>,
}

impl CaptureDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_page(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    /// Record a navigation. A URL change starts a new epoch and forgets
    /// reported images. Returns true when the epoch advanced.
    pub fn navigate(&mut self, url: &str) -> bool {
        let Some(url) = normalize_locator(url) else {
            debug!(url, "ignoring navigation to unsupported locator");
            return false;
        };
        if self.current_page.as_deref() == Some(url.as_str()) {
            return false;
        }
        self.current_page = Some(url);
        self.seen_images.clear();
        self.epoch += 1;
        true
    }

    /// Report an image the first time its locator is seen this epoch.
    pub fn observe_image(&mut self, url: &str) -> Option<Capture> {
        let Some(locator) = normalize_locator(url) else {
            debug!(url, "dropping image with unsupported locator");
            return None;
        };
        if !self.seen_images.insert(locator.clone()) {
            return None;
        }
        Some(Capture::image(locator))
    }

    /// Report article text for the current page, once per page per session.
    pub fn observe_article(&mut self, extraction: ArticleExtraction) -> Option<Capture> {
        let page = self.current_page.clone()?;
        if !self.analyzed_pages.insert(page.clone()) {
            debug!(url = %page, "page already analyzed this session");
            return None;
        }
        Some(Capture::text(page, extraction.title, extraction.text))
    }

    /// Whether article text for `url` has been reported this session.
    pub fn page_analyzed(&self, url: &str) -> bool {
        normalize_locator(url).is_some_and(|u| self.analyzed_pages.contains(&u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureKind;

    fn article() -> ArticleExtraction {
        ArticleExtraction {
            title: "Title".into(),
            text: "some article words".into(),
            word_count: 3,
        }
    }

    #[test]
    fn image_reported_once_per_epoch() {
        let mut dedup = CaptureDeduplicator::new();
        dedup.navigate("https://site.test/page-1");
        assert!(dedup.observe_image("https://cdn.test/a.png").is_some());
        assert!(dedup.observe_image("https://cdn.test/a.png").is_none());
        assert!(dedup.observe_image("https://cdn.test/b.png").is_some());
    }

    #[test]
    fn navigation_allows_reanalysis_of_images() {
        let mut dedup = CaptureDeduplicator::new();
        dedup.navigate("https://site.test/page-1");
        dedup.observe_image("https://cdn.test/a.png").unwrap();
        assert!(dedup.navigate("https://site.test/page-2"));
        assert_eq!(dedup.epoch(), 2);
        let again = dedup.observe_image("https://cdn.test/a.png").unwrap();
        assert_eq!(again.kind(), CaptureKind::Image);
    }

    #[test]
    fn same_url_navigation_keeps_epoch() {
        let mut dedup = CaptureDeduplicator::new();
        dedup.navigate("https://site.test/page-1");
        dedup.observe_image("https://cdn.test/a.png").unwrap();
        assert!(!dedup.navigate("https://site.test/page-1"));
        assert!(dedup.observe_image("https://cdn.test/a.png").is_none());
    }

    #[test]
    fn malformed_locators_dropped() {
        let mut dedup = CaptureDeduplicator::new();
        assert!(dedup.observe_image("").is_none());
        assert!(dedup.observe_image("data:image/gif;base64,R0lG").is_none());
        assert!(!dedup.navigate("about:blank"));
        assert_eq!(dedup.epoch(), 0);
    }

    #[test]
    fn article_text_once_per_page_per_session() {
        let mut dedup = CaptureDeduplicator::new();
        dedup.navigate("https://news.test/story");
        let capture = dedup.observe_article(article()).unwrap();
        assert_eq!(capture.source_locator(), "https://news.test/story");
        assert!(dedup.observe_article(article()).is_none());

        dedup.navigate("https://news.test/other");
        assert!(dedup.observe_article(article()).is_some());

        dedup.navigate("https://news.test/story");
        assert!(dedup.observe_article(article()).is_none());
        assert!(dedup.page_analyzed("https://news.test/story"));
    }

    #[test]
    fn article_without_page_is_dropped() {
        let mut dedup = CaptureDeduplicator::new();
        assert!(dedup.observe_article(article()).is_none());
    }
}
