//! # curriculum-compass
//!
//! Agentic question answering over a university course catalog and a
//! student review corpus.
//!
//! A query passes through validation, intent analysis and query
//! enhancement, then a bounded loop of retrieval and context analysis that
//! re-enhances the queries until the material is sufficient, and finally
//! response synthesis. See [`agent::Orchestrator`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use compass::agent::{AgentConfig, Orchestrator, client::create_provider};
//! use compass::storage::{CorpusStore, corpus_retrievers};
//!
//! # async fn run() -> compass::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let store = CorpusStore::open(std::path::Path::new(".compass/passages.db"))?;
//! let (course, review) = corpus_retrievers(store, config.rerank_pool);
//!
//! let orchestrator = Orchestrator::new(Arc::from(provider), course, review, config);
//! let state = orchestrator.process_query("Is CS 5800 hard?").await;
//! println!("{}", state.final_response.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod error;
#[cfg(feature = "mcp")]
pub mod mcp;
pub mod retrieval;
pub mod storage;

pub use agent::{Orchestrator, PipelineState};
pub use error::{Error, Result};
pub use retrieval::{Passage, Retriever};
pub use storage::{Collection, CorpusStore};
