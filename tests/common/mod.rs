//! Shared fixtures for entityx integration tests
//!
//! Builds pipelines over mock analyzers so no test touches the network.

#![allow(dead_code)]

use entityx::gateway::mock::{MockCompletionProvider, MockImageAnalyzer, MockTextAnalyzer};
use entityx::gateway::{AnalysisGateway, AnalyzerResult, CompletionProvider, FallbackChain};
use entityx::storage::{EvidenceStore, OpenStore, Persistence, SqliteStore};
use entityx::trust::TrustScoreEngine;
use entityx::MonitorPipeline;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const ENRICHMENT_REPLY: &str = r#"```json
{"summary": "Claims about an election", "topic": "Politics", "key_claims": ["turnout was faked"],
 "ai_generated_probability": 0.9, "misinformation_risk": "HIGH", "credibility_score": 0.15,
 "forensic_explanation": ["uniform sentence rhythm", "no attributable sources"]}
```"#;

/// An HTML page whose article body has exactly `words` words.
pub fn article_html(title: &str, words: usize) -> String {
    let body = (0..words)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<html><head><title>{}</title></head><body>\
         <nav>Home World Sport</nav><article><p>{}</p></article>\
         <footer>All rights reserved</footer></body></html>",
        title, body
    )
}

pub fn chain(providers: Vec<MockCompletionProvider>) -> FallbackChain {
    FallbackChain::new(
        providers
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn CompletionProvider>)
            .collect(),
        Duration::from_secs(5),
    )
}

pub struct Harness {
    pub pipeline: MonitorPipeline,
    pub persistence: Persistence,
}

/// Pipeline with fixed analyzer outputs over the given store.
pub fn harness(
    store: Arc<dyn EvidenceStore>,
    image: AnalyzerResult,
    text: AnalyzerResult,
    enrichment: Vec<MockCompletionProvider>,
) -> Harness {
    let persistence = Persistence::new(store);
    let gateway = AnalysisGateway::new(
        Arc::new(MockImageAnalyzer::returning(image)),
        Arc::new(MockTextAnalyzer::returning(text)),
        chain(enrichment),
    );
    let pipeline = MonitorPipeline::new(gateway, Arc::new(TrustScoreEngine::new()), persistence.clone());
    Harness {
        pipeline,
        persistence,
    }
}

pub fn memory_store() -> Arc<dyn EvidenceStore> {
    Arc::new(SqliteStore::open_in_memory().expect("in-memory store"))
}

pub fn disk_store(path: &Path) -> Arc<dyn EvidenceStore> {
    Arc::new(SqliteStore::open(path).expect("on-disk store"))
}
