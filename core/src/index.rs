//! Vector index over a single in-memory document.
//!
//! Ingestion chunks the text, widens each chunk into a sentence block by
//! appending its next neighbors, embeds every block once, and records the
//! page each chunk falls on. The index is built once per document and never
//! mutated afterwards; concurrent readers need no locking.

use crate::embedding::EmbeddingService;
use crate::segmenter::segment;
use crate::Result;
use std::time::Instant;
use tracing::{debug, info};

/// Number of consecutive chunks joined into one embedded sentence block.
pub const DEFAULT_BLOCK_WINDOW: usize = 3;

/// One indexed sentence block.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Position in the chunk sequence; unique and strictly increasing
    pub index: usize,
    /// Character offset of the underlying chunk in the source text
    pub offset: usize,
    /// Zero-based page the chunk falls on
    pub page: usize,
    /// The embedded sentence block (chunk text plus its neighbors)
    pub sentence: String,
    /// Embedding vector; same length across all entries
    pub vector: Vec<f32>,
}

/// Immutable vector index for one document.
#[derive(Debug, Default)]
pub struct DocumentIndex {
    entries: Vec<IndexEntry>,
}

impl DocumentIndex {
    /// Build the index for a document.
    ///
    /// `page_boundaries` holds the cumulative character length at the end
    /// of each page, monotonically increasing. One embedding call is made
    /// per sentence block; if any of them fails the whole build fails and
    /// no partial index is returned.
    pub async fn build(
        text: &str,
        page_boundaries: &[usize],
        embedder: &dyn EmbeddingService,
        window: usize,
    ) -> Result<Self> {
        let chunks = segment(text);
        let started = Instant::now();
        let mut entries = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            let block: Vec<&str> = chunks[index..]
                .iter()
                .take(window.max(1))
                .map(|c| c.text.as_str())
                .collect();
            let sentence = block.join(" ");

            let vector = embedder.embed(&sentence).await?;
            let page = page_for_offset(page_boundaries, chunk.offset);

            debug!(
                target: "embed_index",
                index,
                offset = chunk.offset,
                page,
                dims = vector.len(),
                "Indexed sentence block"
            );

            entries.push(IndexEntry {
                index,
                offset: chunk.offset,
                page,
                sentence,
                vector,
            });
        }

        info!(
            target: "embed_index",
            sentences = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finished computing the vectors"
        );

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locate the page containing `offset`: the first boundary in the
/// cumulative sequence that exceeds it. Offsets past the last boundary
/// land on the last page.
fn page_for_offset(boundaries: &[usize], offset: usize) -> usize {
    if boundaries.is_empty() {
        return 0;
    }
    let page = boundaries.partition_point(|&end| end <= offset);
    page.min(boundaries.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MinervaError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic fake embedder: vector derived from text length.
    struct FakeEmbedder {
        calls: AtomicUsize,
        fail_at: Option<usize>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }
        }

        fn failing_at(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_at: Some(call),
            }
        }
    }

    #[async_trait]
    impl EmbeddingService for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(call) == self.fail_at {
                return Err(MinervaError::Embedding("unavailable".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn entries_are_strictly_increasing() {
        let embedder = FakeEmbedder::new();
        let index = DocumentIndex::build("One. Two. Three.", &[16], &embedder, 3)
            .await
            .unwrap();
        let entries = index.entries();
        assert_eq!(entries.len(), 3);
        for pair in entries.windows(2) {
            assert!(pair[0].index < pair[1].index);
            assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[tokio::test]
    async fn sentence_blocks_include_successors() {
        let embedder = FakeEmbedder::new();
        let index = DocumentIndex::build("One. Two. Three. Four.", &[22], &embedder, 3)
            .await
            .unwrap();
        let entries = index.entries();
        assert_eq!(entries[0].sentence, "One. Two. Three.");
        assert_eq!(entries[1].sentence, "Two. Three. Four.");
        // Window shrinks naturally at the tail
        assert_eq!(entries[3].sentence, "Four.");
    }

    #[tokio::test]
    async fn pages_are_monotonically_non_decreasing() {
        let embedder = FakeEmbedder::new();
        // Two pages: boundary after character 10.
        let index = DocumentIndex::build("One. Two. Three. Four.", &[10, 22], &embedder, 3)
            .await
            .unwrap();
        let entries = index.entries();
        for pair in entries.windows(2) {
            assert!(pair[0].page <= pair[1].page);
        }
        assert_eq!(entries[0].page, 0);
        assert_eq!(entries.last().unwrap().page, 1);
    }

    #[tokio::test]
    async fn failed_embedding_fails_the_whole_build() {
        let embedder = FakeEmbedder::failing_at(1);
        let result = DocumentIndex::build("One. Two. Three.", &[16], &embedder, 3).await;
        assert!(matches!(result, Err(MinervaError::Embedding(_))));
    }

    #[test]
    fn page_lookup_is_clamped() {
        assert_eq!(page_for_offset(&[], 5), 0);
        assert_eq!(page_for_offset(&[10, 20], 0), 0);
        assert_eq!(page_for_offset(&[10, 20], 9), 0);
        assert_eq!(page_for_offset(&[10, 20], 10), 1);
        assert_eq!(page_for_offset(&[10, 20], 19), 1);
        // Past the last boundary still maps to the last page
        assert_eq!(page_for_offset(&[10, 20], 99), 1);
    }
}
