//! Query enhancement agent: rewrites the query once per database.
//!
//! The first pass works from the intent analysis alone. Later passes are
//! driven by context-analysis feedback and revise the previous queries.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::{build_enhancement_prompt, build_feedback_enhancement_prompt};
use super::provider::LlmProvider;
use super::schema::{EnhancedQueries, Feedback};
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Agent that produces per-database search queries.
pub struct QueryEnhancementAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl QueryEnhancementAgent {
    /// Creates a new query enhancement agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.analysis_model.clone(),
            max_tokens: config.analysis_max_tokens,
            system_prompt,
        }
    }

    /// Records the first `enhanced_queries`.
    ///
    /// No-op without an intent analysis. On failure `enhanced_queries` is
    /// cleared and `error` is set.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        let Some(intent) = state.intent_analysis.as_ref() else {
            return state;
        };
        let prompt = build_enhancement_prompt(state.effective_query(), intent);

        match execute_structured::<EnhancedQueries>(self, provider, &prompt).await {
            Ok(queries) => {
                debug!(
                    course_query = %queries.course_db_query,
                    review_query = %queries.review_db_query,
                    "queries enhanced"
                );
                PipelineState {
                    enhanced_queries: Some(queries),
                    stage: Stage::QueryEnhancement,
                    ..state
                }
            }
            Err(e) => {
                warn!(error = %e, "query enhancement failed");
                PipelineState {
                    enhanced_queries: None,
                    ..state
                }
                .with_error(Stage::QueryEnhancement, describe(&e))
            }
        }
    }

    /// Revises `enhanced_queries` using context-analysis feedback.
    ///
    /// No-op without an intent analysis and previous queries. On success
    /// `enhancement_iteration` is incremented. On failure the previous
    /// queries are kept and `error` is set, which ends the refinement loop.
    pub async fn process_feedback(
        &self,
        provider: &dyn LlmProvider,
        state: PipelineState,
        feedback: &Feedback,
    ) -> PipelineState {
        let (Some(intent), Some(previous)) =
            (state.intent_analysis.as_ref(), state.enhanced_queries.as_ref())
        else {
            return state;
        };
        let missing = state
            .context_analysis
            .as_ref()
            .map(|a| a.missing_aspects.as_slice())
            .unwrap_or_default();
        let prompt = build_feedback_enhancement_prompt(
            state.effective_query(),
            intent,
            previous,
            feedback,
            missing,
        );

        match execute_structured::<EnhancedQueries>(self, provider, &prompt).await {
            Ok(queries) => {
                let enhancement_iteration = state.enhancement_iteration + 1;
                debug!(enhancement_iteration, "queries re-enhanced from feedback");
                PipelineState {
                    enhanced_queries: Some(queries),
                    enhancement_iteration,
                    stage: Stage::QueryEnhancementRetry,
                    ..state
                }
            }
            Err(e) => {
                warn!(error = %e, "feedback enhancement failed, keeping previous queries");
                state.with_error(Stage::QueryEnhancementRetry, describe(&e))
            }
        }
    }
}

fn describe(e: &AgentError) -> String {
    match e {
        AgentError::ResponseParse { .. } | AgentError::InvalidOutput { .. } => {
            format!("Failed to parse enhanced queries: {e}")
        }
        _ => format!("Query enhancement error: {e}"),
    }
}

#[async_trait]
impl Agent for QueryEnhancementAgent {
    fn name(&self) -> &'static str {
        "query_enhancement"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
