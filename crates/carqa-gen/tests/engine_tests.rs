use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use carqa_core::error::Result;
use carqa_core::filter::MetadataFilter;
use carqa_core::traits::{Embedder, Generator};
use carqa_core::types::{ChatMessage, DocumentChunk, ReviewType, VehicleMeta};
use carqa_embed::HashEmbedder;
use carqa_gen::{QaEngine, NO_CONTEXT_REPLY};
use carqa_hybrid::{AssemblerConfig, HybridRetriever, RetrievalConfig, SearchSnapshot, SnapshotHandle};
use carqa_sparse::Bm25Params;

struct CannedGenerator {
    reply: String,
    calls: AtomicUsize,
    last_user: Mutex<String>,
}

impl CannedGenerator {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(String::new()),
        }
    }
}

impl Generator for CannedGenerator {
    fn generate(&self, _system: &str, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = messages.last() {
            *self.last_user.lock().unwrap_or_else(|e| e.into_inner()) = last.content.clone();
        }
        Ok(self.reply.clone())
    }
}

fn chunk(id: &str, review_type: ReviewType, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: id.to_string(),
        doc_id: id.split(':').next().unwrap_or(id).to_string(),
        content: content.to_string(),
        review_type,
        vehicle: VehicleMeta {
            make: "BMW".to_string(),
            model: "M5".to_string(),
            body_type: None,
            year: Some(2019),
        },
        chunk_index: 0,
    }
}

fn engine_over(
    chunks: Vec<DocumentChunk>,
    generator: Arc<CannedGenerator>,
) -> QaEngine {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(256));
    let snapshot = SearchSnapshot::build(chunks, embedder.as_ref(), Bm25Params::default())
        .expect("build snapshot");
    let handle = Arc::new(SnapshotHandle::new(snapshot));
    let retriever = HybridRetriever::new(handle, embedder, RetrievalConfig::default())
        .expect("retriever");
    QaEngine::new(retriever, generator, AssemblerConfig::default(), 5)
}

#[test]
fn answer_flows_retrieved_context_into_the_generator() {
    let generator = Arc::new(CannedGenerator::new("The M5 is reliable."));
    let engine = engine_over(
        vec![
            chunk("a:0", ReviewType::Expert, "BMW M5 reliability is excellent"),
            chunk("b:0", ReviewType::LongTerm, "After 3 years the M5 needed minor repairs"),
        ],
        generator.clone(),
    );

    let answer = engine.answer("Is the BMW M5 reliable?", None, &[]).expect("answer");
    assert_eq!(answer, "The M5 is reliable.");
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let user = generator.last_user.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert!(user.contains("Current question: Is the BMW M5 reliable?"));
    assert!(user.contains("Relevant review sections:"));
    assert!(user.contains("[Expert review]"));
}

#[test]
fn empty_corpus_short_circuits_without_calling_the_generator() {
    let generator = Arc::new(CannedGenerator::new("should never be returned"));
    let engine = engine_over(Vec::new(), generator.clone());

    let answer = engine.answer("Is the M5 reliable?", None, &[]).expect("answer");
    assert_eq!(answer, NO_CONTEXT_REPLY);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn filter_mismatch_short_circuits_without_calling_the_generator() {
    let generator = Arc::new(CannedGenerator::new("unused"));
    let engine = engine_over(
        vec![chunk("a:0", ReviewType::Expert, "BMW M5 reliability is excellent")],
        generator.clone(),
    );

    let filter = MetadataFilter::vehicle("Porsche", "911");
    let answer = engine.answer("Is it reliable?", Some(&filter), &[]).expect("answer");
    assert_eq!(answer, NO_CONTEXT_REPLY);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn history_is_rendered_into_previous_context() {
    let generator = Arc::new(CannedGenerator::new("answer"));
    let engine = engine_over(
        vec![chunk("a:0", ReviewType::Expert, "BMW M5 reliability is excellent")],
        generator.clone(),
    );

    let history = vec![
        ChatMessage::user("Tell me about the M5."),
        ChatMessage::assistant("It is a performance sedan."),
    ];
    engine
        .answer("Is the BMW M5 reliable?", None, &history)
        .expect("answer");
    let user = generator.last_user.lock().unwrap_or_else(|e| e.into_inner()).clone();
    assert!(user.contains("Previous context: Q: Tell me about the M5."));
}
