//! In-memory retrieval over generated files.
//!
//! Files are split into overlapping character chunks and ranked against a
//! query by normalized term overlap. Re-inserting a path replaces its chunks.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::ContextStoreError;
use crate::domain::models::ContextConfig;
use crate::domain::ports::{ContextMetadata, ContextSnippet, ContextStore};

#[derive(Debug, Clone)]
struct StoredChunk {
    path: String,
    index: usize,
    content: String,
    terms: HashSet<String>,
    metadata: ContextMetadata,
}

#[derive(Debug)]
pub struct InMemoryContextStore {
    chunk_size: usize,
    chunk_overlap: usize,
    chunks: RwLock<Vec<StoredChunk>>,
}

impl InMemoryContextStore {
    /// Store chunking files into `chunk_size` characters with `chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Store using the configured chunking.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    /// True when nothing is indexed.
    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

/// Split `text` into chunks of at most `size` characters, overlapping by up
/// to `overlap`. Every chunk starts `size - overlap` characters after the
/// previous one. Within the trailing `overlap` characters of a window, cuts
/// prefer the last newline, then the last space. Whitespace-only chunks are
/// dropped.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let size = size.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        return if text.trim().is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            // A cut before `start + step` would leave a gap before the next chunk.
            let tail = &chars[start + step - 1..end];
            let cut = tail
                .iter()
                .rposition(|&c| c == '\n')
                .or_else(|| tail.iter().rposition(|&c| c == ' '));
            if let Some(pos) = cut {
                end = start + step + pos;
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn insert(
        &self,
        path: &str,
        content: &str,
        metadata: &ContextMetadata,
    ) -> Result<(), ContextStoreError> {
        let new_chunks: Vec<StoredChunk> = chunk_text(content, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| StoredChunk {
                path: path.to_string(),
                index,
                terms: terms(&chunk),
                content: chunk,
                metadata: metadata.clone(),
            })
            .collect();

        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| c.path != path);
        debug!(path, chunks = new_chunks.len(), task_id = %metadata.task_id, "indexed file");
        chunks.extend(new_chunks);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ContextSnippet>, ContextStoreError> {
        let query_terms = terms(text);
        if k == 0 || query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let chunks = self.chunks.read().await;
        let mut scored: Vec<(f32, &StoredChunk)> = chunks
            .iter()
            .filter_map(|chunk| {
                let shared = chunk.terms.intersection(&query_terms).count();
                if shared == 0 {
                    return None;
                }
                #[allow(clippy::cast_precision_loss)]
                let score = shared as f32
                    / ((chunk.terms.len() * query_terms.len()) as f32).sqrt();
                Some((score, chunk))
            })
            .collect();

        scored.sort_by(|(a, ca), (b, cb)| {
            b.total_cmp(a)
                .then_with(|| ca.path.cmp(&cb.path))
                .then_with(|| ca.index.cmp(&cb.index))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, chunk)| ContextSnippet {
                path: chunk.path.clone(),
                content: chunk.content.clone(),
                score,
                task_id: chunk.metadata.task_id.clone(),
                language: chunk.metadata.language.clone(),
            })
            .collect())
    }
}
