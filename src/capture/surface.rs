//! Async driver over a stream of browser surface events

use super::debounce::ExtractionTimer;
use super::dedup::CaptureDeduplicator;
use super::extract::extract_article;
use super::Capture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Event emitted by the observed content surface.
///
/// Serialized one per line as `{"event": "image_loaded", "url": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Navigated { url: String },
    ImageLoaded { url: String },
    /// The page DOM, serialized as HTML, after a mutation
    DomMutated { html: String },
    Closed,
}

/// Turns surface events into deduplicated captures.
pub struct SurfaceMonitor {
    dedup: CaptureDeduplicator,
    timer: ExtractionTimer,
    pending_html: Option<String>,
}

impl Default for SurfaceMonitor {
    fn default() -> Self {
        Self::new(ExtractionTimer::default())
    }
}

impl SurfaceMonitor {
    pub fn new(timer: ExtractionTimer) -> Self {
        Self {
            dedup: CaptureDeduplicator::new(),
            timer,
            pending_html: None,
        }
    }

    pub fn deduplicator(&self) -> &CaptureDeduplicator {
        &self.dedup
    }

    /// Apply one event. Images are reported immediately; mutations only arm
    /// the extraction timers.
    pub fn handle(&mut self, event: SurfaceEvent, now: Instant) -> Option<Capture> {
        match event {
            SurfaceEvent::Navigated { url } => {
                if self.dedup.navigate(&url) {
                    debug!(url, epoch = self.dedup.epoch(), "navigation");
                    self.timer.reset();
                    self.pending_html = None;
                }
                None
            }
            SurfaceEvent::ImageLoaded { url } => self.dedup.observe_image(&url),
            SurfaceEvent::DomMutated { html } => {
                self.pending_html = Some(html);
                self.timer.on_mutation(now);
                None
            }
            SurfaceEvent::Closed => None,
        }
    }

    /// Run text extraction if a timer has expired.
    pub fn fire(&mut self, now: Instant) -> Option<Capture> {
        if !self.timer.poll(now) {
            return None;
        }
        let html = self.pending_html.take()?;
        let extraction = extract_article(&html)?;
        self.dedup.observe_article(extraction)
    }

    /// Consume events until `Closed`, the sender is dropped, or the capture
    /// receiver goes away.
    pub async fn run(mut self, mut events: mpsc::Receiver<SurfaceEvent>, captures: mpsc::Sender<Capture>) {
        loop {
            let deadline = self.timer.next_deadline();
            let capture = tokio::select! {
                event = events.recv() => match event {
                    None | Some(SurfaceEvent::Closed) => break,
                    Some(event) => self.handle(event, Instant::now()),
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire(Instant::now())
                }
            };
            if let Some(capture) = capture {
                debug!(kind = ?capture.kind(), url = capture.source_locator(), "capture");
                if captures.send(capture).await.is_err() {
                    break;
                }
            }
        }
        info!(epochs = self.dedup.epoch(), "surface monitor stopped");
    }
}
