//! Retrieval collaborators used by the dynamic retrieval agent.
//!
//! A [`Retriever`] turns a query and a result count into an ordered list of
//! [`Passage`]s. It may return fewer than `k` results; callers never pad.
//! [`Reranker`]s reorder a candidate list and are composed with a retriever
//! through [`RerankingRetriever`].

pub mod rerank;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

pub use rerank::{LexicalReranker, Reranker, RerankingRetriever};

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub text: String,
    /// Relevance score; higher is better. Scales differ between backends.
    pub score: f64,
}

impl Passage {
    /// Creates a passage.
    #[must_use]
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Document retrieval capability.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Returns up to `k` passages for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] if the backend fails.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
