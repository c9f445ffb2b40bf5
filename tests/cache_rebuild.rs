//! Cache coherence across process restarts.
//!
//! Run with: `cargo test --test cache_rebuild`

mod common;

use common::{article_html, disk_store, harness, ENRICHMENT_REPLY};
use entityx::capture::{extract_article, Capture};
use entityx::gateway::mock::MockCompletionProvider;
use entityx::gateway::AnalyzerResult;
use entityx::model::{Entity, EntityType};
use entityx::storage::Persistence;

#[tokio::test]
async fn restart_rebuilds_cache_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("entityx.db");

    let mut originals: Vec<Entity> = Vec::new();
    {
        let h = harness(
            disk_store(&db_path),
            AnalyzerResult::new("image-analyzer").with_fake_probability(0.05),
            AnalyzerResult::new("heuristic")
                .with_ai_generated_probability(0.05)
                .with_findings(["short paragraphs"]),
            vec![MockCompletionProvider::replying("groq", ENRICHMENT_REPLY)],
        );
        for i in 0..12 {
            let capture = Capture::image(format!("https://cdn.test/{}.png", i));
            originals.push(h.pipeline.process(capture, "s").await.unwrap());
        }

        let article = extract_article(&article_html("Election night", 200)).unwrap();
        let capture = Capture::text("https://news.test/election", article.title, article.text);
        originals.push(h.pipeline.process(capture, "s").await.unwrap());
    }

    let text = originals.last().unwrap();
    assert_eq!(text.entity_type, EntityType::Text);
    assert!(text.analysis.enriched);
    assert!(text.extracted_text.is_some());

    let persistence = Persistence::new(disk_store(&db_path));
    assert!(persistence.cache().is_empty());
    assert_eq!(persistence.rebuild_cache(), originals.len());
    assert_eq!(persistence.rebuild_cache(), 0);

    for original in &originals {
        let rebuilt = persistence.cache().get(&original.entity_id).unwrap();
        assert_eq!(&rebuilt, original);
    }
}
