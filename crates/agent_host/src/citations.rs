//! Short-URL resolution and citation bookkeeping.
//!
//! Long source URLs from grounded generations are swapped for compact
//! per-task tokens while text flows through the research loop (saves prompt
//! tokens), then reconciled back to the originals in the final answer.

use crate::state::Source;
use providers::gemini::{GroundedResponse, GroundingChunk};
use std::collections::HashMap;

const SHORT_URL_PREFIX: &str = "https://vertexaisearch.cloud.google.com/id/";

/// A span of generated text together with the sources supporting it.
#[derive(Debug, Clone)]
pub struct Citation {
    pub start_index: usize,
    pub end_index: usize,
    pub segments: Vec<Source>,
}

/// Map each distinct source URL to a short stable token scoped by the task id
/// (`.../id/{task_id}-{index}`), index assigned in first-seen order.
pub fn resolve_urls(chunks: &[GroundingChunk], task_id: usize) -> HashMap<String, String> {
    let mut resolved = HashMap::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        let Some(web) = &chunk.web else { continue };
        resolved
            .entry(web.uri.clone())
            .or_insert_with(|| format!("{}{}-{}", SHORT_URL_PREFIX, task_id, idx));
    }
    resolved
}

fn label_from_title(title: Option<&str>, chunk_idx: usize) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => match t.rsplit_once('.') {
            // "apnews.com" reads better as "apnews"
            Some((head, _)) if !head.is_empty() => head.to_string(),
            _ => t.to_string(),
        },
        _ => format!("source-{}", chunk_idx),
    }
}

/// Extract citations from a grounded response, attaching the short token for
/// each supporting chunk. Supports without an end offset are skipped.
pub fn extract_citations(
    response: &GroundedResponse,
    resolved: &HashMap<String, String>,
) -> Vec<Citation> {
    let Some(grounding) = &response.grounding else {
        return Vec::new();
    };
    let mut citations = Vec::new();
    for support in &grounding.grounding_supports {
        let Some(segment) = &support.segment else {
            continue;
        };
        let Some(end_index) = segment.end_index else {
            continue;
        };
        let mut segments = Vec::new();
        for &chunk_idx in &support.grounding_chunk_indices {
            let Some(web) = grounding
                .grounding_chunks
                .get(chunk_idx)
                .and_then(|c| c.web.as_ref())
            else {
                continue;
            };
            let Some(short_url) = resolved.get(&web.uri) else {
                continue;
            };
            segments.push(Source {
                label: label_from_title(web.title.as_deref(), chunk_idx),
                short_url: short_url.clone(),
                value: web.uri.clone(),
            });
        }
        if !segments.is_empty() {
            citations.push(Citation {
                start_index: segment.start_index,
                end_index,
                segments,
            });
        }
    }
    citations
}

/// Splice ` [label](short_url)` markers into the text at each citation's end
/// offset. Offsets index characters of the original text; inserting from the
/// back keeps earlier offsets valid.
pub fn insert_citation_markers(text: &str, citations: &[Citation]) -> String {
    let mut sorted: Vec<&Citation> = citations.iter().collect();
    sorted.sort_by(|a, b| {
        b.end_index
            .cmp(&a.end_index)
            .then(b.start_index.cmp(&a.start_index))
    });

    let mut result = text.to_string();
    for citation in sorted {
        let marker: String = citation
            .segments
            .iter()
            .map(|s| format!(" [{}]({})", s.label, s.short_url))
            .collect();
        let at = byte_offset_for_char(&result, citation.end_index);
        result.insert_str(at, &marker);
    }
    result
}

fn byte_offset_for_char(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Final reconciliation: substitute each gathered source's short token back
/// to the long URL, in gather order, keeping only sources whose token
/// actually appeared. Substring presence is the sole "was this cited" test.
pub fn reconcile_citations(content: &str, sources: &[Source]) -> (String, Vec<Source>) {
    let mut content = content.to_string();
    let mut unique_sources = Vec::new();
    for source in sources {
        // Placeholder sources from simulated research carry no token.
        if source.short_url.is_empty() {
            continue;
        }
        if content.contains(&source.short_url) {
            content = content.replace(&source.short_url, &source.value);
            unique_sources.push(source.clone());
        }
    }
    (content, unique_sources)
}
