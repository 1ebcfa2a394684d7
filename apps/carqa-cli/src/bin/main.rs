use std::env;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use carqa_core::config::{expand_path, Config};
use carqa_core::filter::MetadataFilter;
use carqa_core::traits::{Embedder, Generator};
use carqa_core::types::{DocumentChunk, ReviewType};
use carqa_embed::{embedder_from_config, EmbeddingConfig};
use carqa_gen::{QaEngine, RemoteGenerator};
use carqa_hybrid::{assemble, AssemblerConfig, HybridRetriever, RetrievalConfig, SearchSnapshot, SnapshotHandle};
use carqa_sparse::Bm25Params;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|search|ask> [args...]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let embedding_cfg: EmbeddingConfig = config.get_or("embedding", EmbeddingConfig::default());
    let embedder: Arc<dyn Embedder> = embedder_from_config(&embedding_cfg)?.into();
    let snapshot_path =
        expand_path(config.get_or("index.snapshot_path", "data/snapshot.json".to_string()));

    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let chunks_path = args.first().map(expand_path).unwrap_or_else(|| {
                expand_path(config.get_or("data.chunks_file", "data/chunks.jsonl".to_string()))
            });
            let chunks = load_chunks(&chunks_path)?;
            println!("Loaded {} chunks from {}", chunks.len(), chunks_path.display());

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
            spinner.set_message("Embedding and indexing chunks...");
            spinner.enable_steady_tick(std::time::Duration::from_millis(120));
            let snapshot =
                SearchSnapshot::build(chunks, embedder.as_ref(), Bm25Params::default())?;
            spinner.finish_with_message("Index build complete");

            snapshot.save(&snapshot_path)?;
            println!("Snapshot written to {}", snapshot_path.display());
        }
        "search" => {
            let query = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: carqa search \"<query>\" [k]");
                std::process::exit(1);
            });
            let k = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(5);
            let retriever = open_retriever(&config, &snapshot_path, embedder.clone())?;
            let filter = parse_filter(&args[1.min(args.len())..]);
            let snapshot = retriever.snapshot();
            let ranked = retriever.retrieve_in(&snapshot, &query, k, filter.as_ref())?;
            if ranked.is_empty() {
                println!("No relevant chunks found.");
                return Ok(());
            }
            for (rank, result) in ranked.iter().enumerate() {
                let preview = snapshot
                    .chunks
                    .get(&result.chunk_id)
                    .map(|c| preview_of(&c.content))
                    .unwrap_or_default();
                println!(
                    "{:>2}. [{:.4}] {:?} {} — {}",
                    rank + 1,
                    result.score,
                    result.origin,
                    result.chunk_id,
                    preview
                );
            }
        }
        "ask" => {
            let question = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: carqa ask \"<question>\" [--make M --model M --review expert|long_term]");
                std::process::exit(1);
            });
            let filter = parse_filter(&args[1..]);
            let retriever = open_retriever(&config, &snapshot_path, embedder.clone())?;
            let assembler = AssemblerConfig {
                max_chars: config.get_or("context.max_chars", 6000),
                overlap_threshold: config.get_or("context.overlap_threshold", 0.8),
            };
            let top_k = config.get_or("retrieval.top_k", 10);

            match config.get::<String>("generator.endpoint") {
                Ok(endpoint) => {
                    let api_key_env: String =
                        config.get_or("generator.api_key_env", "CARQA_GEN_API_KEY".to_string());
                    let generator: Arc<dyn Generator> = Arc::new(RemoteGenerator::new(
                        endpoint,
                        config.get_or("generator.model", "gemini-1.5-flash-8b".to_string()),
                        env::var(api_key_env).ok(),
                        config.get_or("generator.timeout_secs", 60),
                    )?);
                    let engine = QaEngine::new(retriever, generator, assembler, top_k);
                    let answer = engine.answer(&question, filter.as_ref(), &[])?;
                    println!("{answer}");
                }
                Err(_) => {
                    // No generator configured: show what would be sent.
                    let snapshot = retriever.snapshot();
                    let ranked = retriever.retrieve_in(&snapshot, &question, top_k, filter.as_ref())?;
                    if ranked.is_empty() {
                        println!("No relevant context found.");
                        return Ok(());
                    }
                    let context = assemble(&ranked, &snapshot, &assembler)?;
                    println!("No generator.endpoint configured; assembled context:\n");
                    println!("{}", context.render());
                }
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn open_retriever(
    config: &Config,
    snapshot_path: &Path,
    embedder: Arc<dyn Embedder>,
) -> anyhow::Result<HybridRetriever> {
    let snapshot = SearchSnapshot::load(snapshot_path, embedder.as_ref())?;
    let retrieval = RetrievalConfig {
        alpha: config.get_or("retrieval.alpha", 0.5),
        pool_multiplier: config.get_or("retrieval.pool_multiplier", 4),
    };
    let handle = Arc::new(SnapshotHandle::new(snapshot));
    Ok(HybridRetriever::new(handle, embedder, retrieval)?)
}

/// Read chunk JSONL from a file, or from every `.jsonl` file under a
/// directory. Ingestion upstream of this boundary owns scraping and
/// cleaning; here each line is already a complete `DocumentChunk`.
fn load_chunks(path: &Path) -> anyhow::Result<Vec<DocumentChunk>> {
    let files: Vec<PathBuf> = if path.is_dir() {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("jsonl"))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut chunks = Vec::new();
    for file in &files {
        let reader = BufReader::new(std::fs::File::open(file)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: DocumentChunk = serde_json::from_str(&line).map_err(|e| {
                anyhow::anyhow!("{}:{}: bad chunk record: {e}", file.display(), line_no + 1)
            })?;
            chunks.push(chunk);
        }
    }
    Ok(chunks)
}

fn parse_filter(args: &[String]) -> Option<MetadataFilter> {
    let mut filter = MetadataFilter::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--make" => filter.make = iter.next().cloned(),
            "--model" => filter.model = iter.next().cloned(),
            "--body" => filter.body_type = iter.next().cloned(),
            "--review" => {
                filter.review_type = match iter.next().map(String::as_str) {
                    Some("expert") => Some(ReviewType::Expert),
                    Some("long_term") => Some(ReviewType::LongTerm),
                    _ => None,
                }
            }
            "--year-min" => filter.year_min = iter.next().and_then(|s| s.parse().ok()),
            "--year-max" => filter.year_max = iter.next().and_then(|s| s.parse().ok()),
            _ => {}
        }
    }
    if filter.is_empty() {
        None
    } else {
        Some(filter)
    }
}

fn preview_of(content: &str) -> String {
    let mut preview: String = content.chars().take(80).collect();
    if content.chars().count() > 80 {
        preview.push('…');
    }
    preview
}
