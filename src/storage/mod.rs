//! Passage storage backing the course and review retrievers.
//!
//! Passages live in one SQLite FTS5 table partitioned by [`Collection`].

pub mod sqlite;

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

pub use sqlite::{CorpusStore, SqliteRetriever};

use crate::retrieval::{LexicalReranker, RerankingRetriever, Retriever};

/// Default database path relative to the current directory.
pub const DEFAULT_DB_PATH: &str = ".compass/passages.db";

/// The two passage collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Course catalog records.
    Course,
    /// Student review records.
    Review,
}

impl Collection {
    /// All collections, in display order.
    pub const ALL: [Self; 2] = [Self::Course, Self::Review];

    /// Returns the string stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Builds the course and review retrievers over one shared store.
///
/// Each retriever over-fetches `rerank_pool` passages and reranks them
/// lexically before truncating.
pub fn corpus_retrievers(
    store: CorpusStore,
    rerank_pool: usize,
) -> (Arc<dyn Retriever>, Arc<dyn Retriever>) {
    let store = Arc::new(Mutex::new(store));
    let reranker = Arc::new(LexicalReranker);
    let wrap = |collection: Collection| -> Arc<dyn Retriever> {
        Arc::new(RerankingRetriever::new(
            Arc::new(SqliteRetriever::new(Arc::clone(&store), collection)),
            reranker.clone(),
            rerank_pool,
        ))
    };
    (wrap(Collection::Course), wrap(Collection::Review))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads() {
        assert_eq!(format!("{:<8}|", Collection::Review), "review  |");
    }

    #[tokio::test]
    async fn test_corpus_retrievers_read_their_own_collection() {
        let store = CorpusStore::in_memory().unwrap_or_else(|_| unreachable!());
        store
            .insert(Collection::Course, "CS 5800 Algorithms meets MWF")
            .unwrap_or_else(|_| unreachable!());
        store
            .insert(Collection::Review, "Algorithms homework is long")
            .unwrap_or_else(|_| unreachable!());

        let (course, review) = corpus_retrievers(store, 10);
        let hits = course
            .retrieve("algorithms", 5)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(hits.len(), 1);
        assert!(hits[0].text.contains("MWF"));
        let hits = review
            .retrieve("algorithms", 5)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(hits[0].text.contains("homework"));
        assert_eq!(course.name(), "course+rerank");
    }
}
