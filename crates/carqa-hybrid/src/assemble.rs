//! Turns a ranked list into a bounded, labeled context block for
//! prompt injection. Provenance (expert vs long-term) stays attached to
//! every excerpt so the generator can weigh the two review kinds
//! differently.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use carqa_core::error::{Error, Result};
use carqa_core::types::{ChunkId, RetrievalResult, ReviewType, VehicleMeta};
use carqa_sparse::tokenize;

use crate::snapshot::SearchSnapshot;

const SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AssemblerConfig {
    /// Total rendered budget in characters.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Token-set Jaccard similarity above which two excerpts from the
    /// same source document count as duplicates.
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f32,
}

fn default_max_chars() -> usize {
    6000
}

fn default_overlap_threshold() -> f32 {
    0.8
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self { max_chars: default_max_chars(), overlap_threshold: default_overlap_threshold() }
    }
}

/// One labeled excerpt of the assembled context, in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct Excerpt {
    pub chunk_id: ChunkId,
    pub review_type: ReviewType,
    pub vehicle: VehicleMeta,
    pub text: String,
    pub score: f32,
}

impl Excerpt {
    fn render(&self) -> String {
        format!(
            "[{}] Section from {} review:\n{}",
            self.review_type.label(),
            self.vehicle.display_name(),
            self.text
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembledContext {
    pub excerpts: Vec<Excerpt>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    /// Rendered form injected into the prompt. Guaranteed to stay
    /// within the `max_chars` the context was assembled with.
    pub fn render(&self) -> String {
        self.excerpts
            .iter()
            .map(Excerpt::render)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

/// Select excerpts from `ranked` in order, drop near-duplicates from
/// the same source document, and pack greedily into `max_chars`.
///
/// Excerpts are never split: one that cannot fit inside `max_chars` on
/// its own is skipped outright, and packing stops once the remaining
/// budget is exhausted. Fails with `Error::Assembly` only when the
/// ranked list is non-empty yet no excerpt individually fits.
pub fn assemble(
    ranked: &[RetrievalResult],
    snapshot: &SearchSnapshot,
    config: &AssemblerConfig,
) -> Result<AssembledContext> {
    let mut kept: Vec<Excerpt> = Vec::new();
    let mut kept_tokens: Vec<(String, HashSet<String>)> = Vec::new();
    let mut used = 0usize;

    for result in ranked {
        let Some(chunk) = snapshot.chunks.get(&result.chunk_id) else {
            // Ranked against a newer snapshot generation; skip quietly.
            tracing::debug!(chunk_id = %result.chunk_id, "ranked chunk missing from snapshot");
            continue;
        };

        let excerpt = Excerpt {
            chunk_id: chunk.id.clone(),
            review_type: chunk.review_type,
            vehicle: chunk.vehicle.clone(),
            text: chunk.content.clone(),
            score: result.score,
        };

        // Ranked order is score-descending, so on overlap the earlier
        // (higher-scored) excerpt always survives.
        let tokens: HashSet<String> = tokenize(&chunk.content).into_iter().collect();
        let duplicate = kept_tokens.iter().any(|(doc_id, other)| {
            *doc_id == chunk.doc_id && jaccard(&tokens, other) > config.overlap_threshold
        });
        if duplicate {
            continue;
        }

        let rendered_len = excerpt.render().chars().count();
        let needed = if kept.is_empty() {
            rendered_len
        } else {
            rendered_len + SEPARATOR.len()
        };
        if rendered_len > config.max_chars {
            // Can never fit, not even alone.
            continue;
        }
        if used + needed > config.max_chars {
            break;
        }

        used += needed;
        kept_tokens.push((chunk.doc_id.clone(), tokens));
        kept.push(excerpt);
    }

    if kept.is_empty() && !ranked.is_empty() {
        return Err(Error::Assembly(format!(
            "no excerpt fits within {} characters",
            config.max_chars
        )));
    }
    Ok(AssembledContext { excerpts: kept })
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = (a.len() + b.len()) as f32 - intersection;
    intersection / union
}
