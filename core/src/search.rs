//! Semantic search over the document index.
//!
//! Covers the three retrieval concerns of a turn: top-k scoring of the
//! corpus, the score-gated "answer from memory" fallback, and the citation
//! re-rank that attributes the final answer to a page.

use crate::embedding::EmbeddingService;
use crate::index::IndexEntry;
use crate::{MinervaError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of matches returned per query.
pub const TOP_K: usize = 3;

/// Best-score floor below which retrieval is considered ungrounded.
pub const SCORE_THRESHOLD: f32 = 0.4;

/// Citation text used when a turn was answered without retrieved passages.
pub const FROM_MEMORY: &str = "From my memory.";

/// A corpus entry paired with its cosine score for one query.
#[derive(Debug, Clone)]
pub struct ScoredMatch<'a> {
    pub entry: &'a IndexEntry,
    pub score: f32,
}

/// Cosine similarity of two vectors. Returns 0.0 when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Outcome of score-gated retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Passages worth grounding on, ordered by chunk index.
    Grounded {
        /// Sentences of the retained entries joined by spaces
        passage: String,
        /// Deduplicated chunk indices, ascending; used for the citation
        /// re-rank after the final answer is known
        indices: Vec<usize>,
    },
    /// Best score fell below the threshold; answer from model memory.
    FromMemory,
}

/// The citation attached to a grounded turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub source: String,
    pub reference: String,
}

impl Citation {
    pub fn from_memory() -> Self {
        Self {
            source: FROM_MEMORY.to_string(),
            reference: FROM_MEMORY.to_string(),
        }
    }
}

/// Query-side search over an immutable corpus.
#[derive(Clone)]
pub struct SemanticSearch {
    embedder: Arc<dyn EmbeddingService>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self { embedder }
    }

    /// Embed the query once and return the `top_k` best entries, sorted by
    /// score descending. Ties keep corpus order (stable sort). Errors on an
    /// empty corpus; search before ingestion is a caller bug, not a miss.
    pub async fn search<'a>(
        &self,
        query: &str,
        corpus: &'a [IndexEntry],
        top_k: usize,
    ) -> Result<Vec<ScoredMatch<'a>>> {
        if corpus.is_empty() {
            return Err(MinervaError::EmptyCorpus);
        }

        let query_vector = self.embedder.embed(query).await?;
        let mut matches: Vec<ScoredMatch<'a>> = corpus
            .iter()
            .map(|entry| ScoredMatch {
                score: cosine_similarity(&query_vector, &entry.vector),
                entry,
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        debug!(
            target: "semantic_search",
            query_chars = query.len(),
            matches = matches.len(),
            best = matches.first().map(|m| m.score).unwrap_or(0.0),
            "Search complete"
        );

        Ok(matches)
    }

    /// Score-gated retrieval for a question.
    ///
    /// The query is the question concatenated with the model's own
    /// observation hint, which biases retrieval toward what the model
    /// already guessed. A best score below [`SCORE_THRESHOLD`] means the
    /// corpus cannot ground the question and the caller should fall back
    /// to model memory.
    pub async fn retrieve(
        &self,
        question: &str,
        hint: &str,
        corpus: &[IndexEntry],
    ) -> Result<Retrieval> {
        let query = if hint.is_empty() {
            question.to_string()
        } else {
            format!("{question} {hint}")
        };

        let matches = self.search(&query, corpus, TOP_K).await?;
        let best = matches.first().map(|m| m.score).unwrap_or(0.0);
        if best < SCORE_THRESHOLD {
            info!(
                target: "semantic_search",
                best,
                threshold = SCORE_THRESHOLD,
                "Retrieval ungrounded, falling back to model memory"
            );
            return Ok(Retrieval::FromMemory);
        }

        // Deduplicate and order by chunk index so the passage reads in
        // document order.
        let indices: Vec<usize> = matches
            .iter()
            .map(|m| m.entry.index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let passage = indices
            .iter()
            .filter_map(|&i| corpus.iter().find(|e| e.index == i))
            .map(|e| e.sentence.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Retrieval::Grounded { passage, indices })
    }

    /// Re-rank the already-retrieved subset against the final answer text
    /// and format the best entry as a citation.
    pub async fn cite(
        &self,
        answer: &str,
        corpus: &[IndexEntry],
        indices: &[usize],
    ) -> Result<Citation> {
        let subset: Vec<IndexEntry> = corpus
            .iter()
            .filter(|e| indices.contains(&e.index))
            .cloned()
            .collect();
        if subset.is_empty() {
            return Ok(Citation::from_memory());
        }

        let matches = self.search(answer, &subset, 1).await?;
        let best = &matches[0];
        let percent = (best.score * 100.0).round() as i64;

        Ok(Citation {
            source: format!("Page {}, {}% match", best.entry.page + 1, percent),
            reference: best.entry.sentence.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Embeds known phrases to fixed unit vectors so scores are exact.
    struct PhraseEmbedder;

    #[async_trait]
    impl EmbeddingService for PhraseEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let v = if text.contains("Paris") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("Rome") {
                vec![0.0, 1.0, 0.0]
            } else {
                // Points away from every corpus vector so nothing matches
                vec![-0.577, -0.577, -0.577]
            };
            Ok(v)
        }
    }

    fn entry(index: usize, page: usize, sentence: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            index,
            offset: index * 10,
            page,
            sentence: sentence.to_string(),
            vector,
        }
    }

    fn corpus() -> Vec<IndexEntry> {
        vec![
            entry(0, 0, "Paris is the capital of France.", vec![1.0, 0.0, 0.0]),
            entry(1, 0, "Rome is the capital of Italy.", vec![0.0, 1.0, 0.0]),
            entry(2, 1, "Something unrelated entirely.", vec![0.0, 0.0, 1.0]),
        ]
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.7, 0.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_returns_scores_descending() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        let matches = search.search("Paris", &corpus, 3).await.unwrap();
        assert_eq!(matches.len(), 3);
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(matches[0].entry.index, 0);
    }

    #[tokio::test]
    async fn search_truncates_to_top_k() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        let matches = search.search("Paris", &corpus, 2).await.unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn empty_corpus_is_an_error() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let result = search.search("anything", &[], 3).await;
        assert!(matches!(result, Err(MinervaError::EmptyCorpus)));
    }

    #[tokio::test]
    async fn low_scores_trigger_memory_fallback() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        // "neither" embeds off-axis; best cosine against the corpus stays
        // below the 0.4 gate.
        let retrieval = search.retrieve("neither city", "", &corpus).await.unwrap();
        assert_eq!(retrieval, Retrieval::FromMemory);
    }

    #[tokio::test]
    async fn good_scores_ground_the_question() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        let retrieval = search
            .retrieve("capital of France", "Paris", &corpus)
            .await
            .unwrap();
        match retrieval {
            Retrieval::Grounded { passage, indices } => {
                assert!(passage.contains("Paris is the capital of France."));
                // Indices come back ascending and deduplicated
                let mut sorted = indices.clone();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(indices, sorted);
            }
            Retrieval::FromMemory => panic!("expected grounded retrieval"),
        }
    }

    #[tokio::test]
    async fn threshold_is_exclusive_at_the_gate() {
        struct GateEmbedder {
            score: f32,
        }

        #[async_trait]
        impl EmbeddingService for GateEmbedder {
            async fn embed(&self, text: &str) -> Result<Vec<f32>> {
                if text == "corpus" {
                    Ok(vec![1.0, 0.0])
                } else {
                    // Unit vector whose cosine against [1, 0] equals score
                    let s = self.score;
                    Ok(vec![s, (1.0 - s * s).sqrt()])
                }
            }
        }

        let below = vec![entry(0, 0, "corpus", vec![1.0, 0.0])];

        let search = SemanticSearch::new(Arc::new(GateEmbedder { score: 0.39 }));
        let r = search.retrieve("q", "", &below).await.unwrap();
        assert_eq!(r, Retrieval::FromMemory);

        let search = SemanticSearch::new(Arc::new(GateEmbedder { score: 0.41 }));
        let r = search.retrieve("q", "", &below).await.unwrap();
        assert!(matches!(r, Retrieval::Grounded { .. }));
    }

    #[tokio::test]
    async fn citation_picks_best_entry_of_subset() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        let citation = search
            .cite("The capital of France is Paris.", &corpus, &[0, 1])
            .await
            .unwrap();
        assert_eq!(citation.reference, "Paris is the capital of France.");
        assert!(citation.source.contains("Page 1"));
        assert!(citation.source.contains("100%"));
    }

    #[tokio::test]
    async fn citation_over_empty_subset_degrades_to_memory() {
        let search = SemanticSearch::new(Arc::new(PhraseEmbedder));
        let corpus = corpus();
        let citation = search.cite("whatever", &corpus, &[]).await.unwrap();
        assert_eq!(citation, Citation::from_memory());
    }
}
