//! Re-ranking of retrieved candidates.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::{Passage, Retriever};
use crate::error::RetrievalError;

/// Re-ranking capability: reorders candidates and truncates to `k`.
pub trait Reranker: Send + Sync {
    /// Returns at most `k` passages, most relevant first.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Rerank`] if scoring fails.
    fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError>;
}

/// Scores passages by the fraction of distinct query terms they contain.
///
/// Terms are lowercase Unicode words. Ties keep retrieval order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalReranker;

fn terms(text: &str) -> HashSet<String> {
    text.unicode_words().map(str::to_lowercase).collect()
}

impl Reranker for LexicalReranker {
    fn rerank(
        &self,
        query: &str,
        passages: Vec<Passage>,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(passages.into_iter().take(k).collect());
        }

        #[allow(clippy::cast_precision_loss)]
        let denom = query_terms.len() as f64;
        let mut scored: Vec<Passage> = passages
            .into_iter()
            .map(|p| {
                let hits = terms(&p.text).intersection(&query_terms).count();
                #[allow(clippy::cast_precision_loss)]
                let score = hits as f64 / denom;
                Passage { score, ..p }
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Fetches a wider candidate pool from an inner retriever and reranks it.
pub struct RerankingRetriever {
    inner: Arc<dyn Retriever>,
    reranker: Arc<dyn Reranker>,
    pool: usize,
    name: String,
}

impl RerankingRetriever {
    /// Wraps `inner`, fetching at least `pool` candidates per call.
    #[must_use]
    pub fn new(inner: Arc<dyn Retriever>, reranker: Arc<dyn Reranker>, pool: usize) -> Self {
        let name = format!("{}+rerank", inner.name());
        Self {
            inner,
            reranker,
            pool,
            name,
        }
    }
}

impl std::fmt::Debug for RerankingRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankingRetriever")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Retriever for RerankingRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let fetch = k.max(self.pool);
        let candidates = self.inner.retrieve(query, fetch).await?;
        debug!(retriever = %self.name, k, fetched = candidates.len(), "reranking candidates");

        let fallback: Vec<Passage> = candidates.iter().take(k).cloned().collect();
        match self.reranker.rerank(query, candidates, k) {
            Ok(ranked) => Ok(ranked),
            Err(e) => {
                warn!(retriever = %self.name, error = %e, "rerank failed, keeping retrieval order");
                Ok(fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRetriever {
        passages: Vec<Passage>,
        last_k: AtomicUsize,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
            self.last_k.store(k, Ordering::SeqCst);
            Ok(self.passages.iter().take(k).cloned().collect())
        }
    }

    struct FailingReranker;

    impl Reranker for FailingReranker {
        fn rerank(
            &self,
            _query: &str,
            _passages: Vec<Passage>,
            _k: usize,
        ) -> Result<Vec<Passage>, RetrievalError> {
            Err(RetrievalError::Rerank {
                message: "model unavailable".to_string(),
            })
        }
    }

    fn corpus() -> Vec<Passage> {
        vec![
            Passage::new("Intro to programming in Python", 0.9),
            Passage::new("Algorithms: hard exams, heavy workload", 0.8),
            Passage::new("Algorithms course schedule MWF", 0.7),
        ]
    }

    #[test]
    fn test_lexical_rerank_orders_by_overlap() {
        let ranked = LexicalReranker
            .rerank("algorithms workload", corpus(), 2)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].text.contains("workload"));
        assert!(ranked[1].text.contains("schedule"));
    }

    #[test]
    fn test_lexical_rerank_empty_query_keeps_order() {
        let ranked = LexicalReranker
            .rerank("   ", corpus(), 1)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(ranked[0].text, "Intro to programming in Python");
    }

    #[tokio::test]
    async fn test_reranking_retriever_fetches_pool() {
        let inner = Arc::new(FixedRetriever {
            passages: corpus(),
            last_k: AtomicUsize::new(0),
        });
        let retriever = RerankingRetriever::new(inner.clone(), Arc::new(LexicalReranker), 10);
        let out = retriever
            .retrieve("algorithms schedule", 1)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(inner.last_k.load(Ordering::SeqCst), 10);
        assert_eq!(out.len(), 1);
        assert!(out[0].text.contains("schedule"));
        assert_eq!(retriever.name(), "fixed+rerank");
    }

    #[tokio::test]
    async fn test_reranking_retriever_falls_back_on_failure() {
        let inner = Arc::new(FixedRetriever {
            passages: corpus(),
            last_k: AtomicUsize::new(0),
        });
        let retriever = RerankingRetriever::new(inner, Arc::new(FailingReranker), 5);
        let out = retriever
            .retrieve("algorithms", 2)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Intro to programming in Python");
    }
}
