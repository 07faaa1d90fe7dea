//! Agent pipeline for course questions.
//!
//! Each agent is one LLM call with a JSON-mode system prompt and a typed
//! output validated at the parse boundary. Agents take a [`PipelineState`]
//! by value and return an updated copy; the [`Orchestrator`] sequences them.
//!
//! # Architecture
//!
//! ```text
//! User query → Orchestrator
//!   ├── ValidationAgent (is this about courses?)
//!   ├── IntentAgent (course info, student experience, or both)
//!   ├── QueryEnhancementAgent (one query per database)
//!   ├── loop ≤ max_retrieval_attempts
//!   │   ├── DynamicRetrievalAgent (split k, query both retrievers)
//!   │   ├── ContextAnalysisAgent (sufficient? answerable?)
//!   │   └── QueryEnhancementAgent (re-enhance from feedback)
//!   └── ResponseAgent → final answer
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod enhancement;
pub mod intent;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod response;
pub mod retrieval;
pub mod schema;
pub mod state;
#[cfg(test)]
mod testing;
pub mod traits;
pub mod validation;

// Re-export key types
pub use config::AgentConfig;
pub use context::ContextAnalysisAgent;
pub use enhancement::QueryEnhancementAgent;
pub use intent::IntentAgent;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use response::ResponseAgent;
pub use retrieval::DynamicRetrievalAgent;
pub use schema::{
    ContextAnalysis, EnhancedQueries, Feedback, IntentAnalysis, PrimaryIntent, PrioritySource,
    ProcessingStatus, ResponseData, RetrievalStrategy, RetrievedInfo, Validate, ValidationVerdict,
};
pub use state::{PipelineState, Stage, StageError};
pub use traits::{Agent, execute_structured};
pub use validation::ValidationAgent;
