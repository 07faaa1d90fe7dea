//! Dynamic retrieval agent: splits the result budget and queries both databases.
//!
//! The model proposes `course_k`/`review_k`; the proposal is corrected so the
//! two always sum to the configured budget, and replaced by an even split when
//! it is unusable. Both retrievals run concurrently and their results are
//! truncated to the requested counts, never padded.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::build_strategy_prompt;
use super::provider::LlmProvider;
use super::schema::{
    EnhancedQueries, Feedback, IntentAnalysis, RetrievalStrategy, RetrievedInfo, StrategyProposal,
};
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::{AgentError, RetrievalError};
use crate::retrieval::Retriever;

/// Agent that chooses a retrieval split and executes it.
pub struct DynamicRetrievalAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    total_k: usize,
    course: Arc<dyn Retriever>,
    review: Arc<dyn Retriever>,
}

impl DynamicRetrievalAgent {
    /// Creates a new retrieval agent over the course and review retrievers.
    #[must_use]
    pub fn new(
        config: &AgentConfig,
        system_prompt: String,
        course: Arc<dyn Retriever>,
        review: Arc<dyn Retriever>,
    ) -> Self {
        Self {
            model: config.analysis_model.clone(),
            max_tokens: config.analysis_max_tokens,
            system_prompt,
            total_k: config.total_k,
            course,
            review,
        }
    }

    /// Combined budget every strategy honours.
    #[must_use]
    pub const fn total_k(&self) -> usize {
        self.total_k
    }

    /// Asks the model for a split proposal.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails or the proposal is unusable.
    pub async fn propose_strategy(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        intent: Option<&IntentAnalysis>,
        previous: Option<(&RetrievalStrategy, &Feedback)>,
    ) -> Result<StrategyProposal, AgentError> {
        let prompt = build_strategy_prompt(query, intent, self.total_k, previous);
        execute_structured(self, provider, &prompt).await
    }

    /// Returns a split that sums to the budget, falling back to an even split.
    pub async fn determine_retrieval_strategy(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        intent: Option<&IntentAnalysis>,
        previous: Option<(&RetrievalStrategy, &Feedback)>,
    ) -> RetrievalStrategy {
        match self.propose_strategy(provider, query, intent, previous).await {
            Ok(proposal) => {
                let strategy = RetrievalStrategy::from_proposal(&proposal, self.total_k);
                let rescaled = i64::try_from(strategy.course_k).ok() != Some(proposal.course_k)
                    || i64::try_from(strategy.review_k).ok() != Some(proposal.review_k);
                if rescaled {
                    debug!(
                        proposed_course_k = proposal.course_k,
                        proposed_review_k = proposal.review_k,
                        course_k = strategy.course_k,
                        review_k = strategy.review_k,
                        "strategy rescaled to budget"
                    );
                }
                strategy
            }
            Err(e) => {
                warn!(error = %e, "strategy selection failed, using even split");
                RetrievalStrategy::even_split(self.total_k)
            }
        }
    }

    /// Runs both retrievals concurrently and truncates each to its `k`.
    ///
    /// # Errors
    ///
    /// Returns the first [`RetrievalError`] raised by either retriever.
    pub async fn retrieve(
        &self,
        strategy: &RetrievalStrategy,
        queries: &EnhancedQueries,
    ) -> Result<RetrievedInfo, RetrievalError> {
        let (mut course_info, mut review_info) = try_join(
            self.course
                .retrieve(&queries.course_db_query, strategy.course_k),
            self.review
                .retrieve(&queries.review_db_query, strategy.review_k),
        )
        .await?;
        course_info.truncate(strategy.course_k);
        review_info.truncate(strategy.review_k);
        Ok(RetrievedInfo {
            course_info,
            review_info,
        })
    }

    /// Records `retrieval_strategy` and `retrieved_info`.
    ///
    /// No-op without enhanced queries. On retrieval failure `error` is set
    /// and `retrieved_info` is left as it was.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        let Some(queries) = state.enhanced_queries.as_ref() else {
            return state;
        };
        let previous = state
            .retrieval_strategy
            .as_ref()
            .zip(state.improvement_feedback.as_ref());

        let strategy = self
            .determine_retrieval_strategy(
                provider,
                state.effective_query(),
                state.intent_analysis.as_ref(),
                previous,
            )
            .await;

        match self.retrieve(&strategy, queries).await {
            Ok(info) => {
                debug!(
                    attempt = state.retrieval_iteration,
                    course_k = strategy.course_k,
                    review_k = strategy.review_k,
                    course_hits = info.course_info.len(),
                    review_hits = info.review_info.len(),
                    "retrieval complete"
                );
                PipelineState {
                    retrieval_strategy: Some(strategy),
                    retrieved_info: Some(info),
                    stage: Stage::DynamicRetrieval,
                    ..state
                }
            }
            Err(e) => {
                warn!(error = %e, "retrieval failed");
                PipelineState {
                    retrieval_strategy: Some(strategy),
                    ..state
                }
                .with_error(Stage::DynamicRetrieval, format!("Retrieval error: {e}"))
            }
        }
    }
}

#[async_trait]
impl Agent for DynamicRetrievalAgent {
    fn name(&self) -> &'static str {
        "dynamic_retrieval"
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
