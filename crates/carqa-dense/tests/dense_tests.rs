use std::collections::HashSet;

use carqa_core::error::Error;
use carqa_core::traits::Embedder;
use carqa_core::types::{DocumentChunk, ReviewType, VehicleMeta, MAX_CHUNK_CHARS};
use carqa_dense::DenseIndex;
use carqa_embed::HashEmbedder;

fn chunk(id: &str, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: id.to_string(),
        doc_id: id.split(':').next().unwrap_or(id).to_string(),
        content: content.to_string(),
        review_type: ReviewType::Expert,
        vehicle: VehicleMeta {
            make: "BMW".to_string(),
            model: "M5".to_string(),
            body_type: None,
            year: Some(2019),
        },
        chunk_index: 0,
    }
}

fn corpus() -> Vec<DocumentChunk> {
    vec![
        chunk("a:0", "BMW M5 reliability is excellent"),
        chunk("b:0", "After 3 years the M5 needed minor repairs"),
        chunk("c:0", "Tesla Model S comfort review"),
    ]
}

#[test]
fn build_rejects_empty_content() {
    let embedder = HashEmbedder::new(64);
    let chunks = vec![chunk("a:0", "   ")];
    assert!(matches!(DenseIndex::build(&chunks, &embedder), Err(Error::Ingestion(_))));
}

#[test]
fn build_rejects_oversized_content() {
    let embedder = HashEmbedder::new(64);
    let chunks = vec![chunk("a:0", &"w ".repeat(MAX_CHUNK_CHARS))];
    assert!(matches!(DenseIndex::build(&chunks, &embedder), Err(Error::Ingestion(_))));
}

#[test]
fn search_scores_live_in_unit_interval() {
    let embedder = HashEmbedder::new(256);
    let index = DenseIndex::build(&corpus(), &embedder).expect("build");
    let hits = index.search_text("BMW M5 reliability", &embedder, 3, None).expect("search");
    assert_eq!(hits.len(), 3);
    for (_, score) in &hits {
        assert!((0.0..=1.0).contains(score));
    }
    assert_eq!(hits[0].0, "a:0", "lexical and semantic match ranks first");
}

#[test]
fn empty_index_is_a_query_error() {
    let embedder = HashEmbedder::new(64);
    let index = DenseIndex::build(&[], &embedder).expect("build");
    assert!(matches!(index.search_text("anything", &embedder, 5, None), Err(Error::Query(_))));
}

#[test]
fn zero_n_is_a_query_error() {
    let embedder = HashEmbedder::new(64);
    let index = DenseIndex::build(&corpus(), &embedder).expect("build");
    assert!(matches!(index.search_text("bmw", &embedder, 0, None), Err(Error::Query(_))));
}

#[test]
fn dimension_mismatch_is_a_query_error() {
    let embedder = HashEmbedder::new(64);
    let index = DenseIndex::build(&corpus(), &embedder).expect("build");
    assert!(matches!(index.search_vec(&[0.1; 32], 3, None), Err(Error::Query(_))));
}

#[test]
fn allowed_set_restricts_candidates() {
    let embedder = HashEmbedder::new(256);
    let index = DenseIndex::build(&corpus(), &embedder).expect("build");
    let allowed: HashSet<String> = ["c:0".to_string()].into_iter().collect();
    let hits = index.search_text("BMW M5 reliability", &embedder, 3, Some(&allowed)).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "c:0");
}

#[test]
fn rebuilding_from_the_same_chunks_is_idempotent() {
    let embedder = HashEmbedder::new(128);
    let first = DenseIndex::build(&corpus(), &embedder).expect("build");
    let second = DenseIndex::build(&corpus(), &embedder).expect("build");
    let q = embedder.embed_batch(&["M5 ownership".to_string()]).expect("embed").remove(0);
    let a = first.search_vec(&q, 3, None).expect("search");
    let b = second.search_vec(&q, 3, None).expect("search");
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.0, y.0);
        assert_eq!(x.1.to_bits(), y.1.to_bits());
    }
}
