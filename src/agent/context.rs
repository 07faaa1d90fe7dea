//! Context analysis agent: decides whether the refinement loop continues.
//!
//! `needs_improvement` is true only when the model says the material is
//! insufficient *and* the question is still answerable. Every failure path
//! resolves to "sufficient", so a broken analysis ends the loop rather than
//! extending it. An iteration guard forces the same outcome without a model
//! call once `retrieval_iteration` reaches `max_iterations`.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::prompt::build_context_prompt;
use super::provider::LlmProvider;
use super::schema::ContextAnalysis;
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Agent that judges sufficiency of retrieved material.
pub struct ContextAnalysisAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    max_iterations: usize,
}

impl ContextAnalysisAgent {
    /// Creates a new context analysis agent.
    ///
    /// The iteration guard is `config.max_retrieval_attempts`.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.analysis_model.clone(),
            max_tokens: config.analysis_max_tokens,
            system_prompt,
            max_iterations: config.max_retrieval_attempts,
        }
    }

    /// Overrides the iteration guard.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Records the verdict, `needs_improvement`, `unanswerable` and feedback.
    ///
    /// No-op without `retrieved_info`.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        let Some(retrieved) = state.retrieved_info.as_ref() else {
            return state;
        };

        if state.retrieval_iteration >= self.max_iterations {
            info!(
                iteration = state.retrieval_iteration,
                max_iterations = self.max_iterations,
                "iteration guard reached, forcing sufficiency"
            );
            let analysis = ContextAnalysis::forced_sufficient(
                Vec::new(),
                "Max retrieval iterations reached - forcing exit.",
            );
            return Self::settle(state, analysis);
        }

        let prompt = build_context_prompt(
            state.effective_query(),
            state.intent_analysis.as_ref(),
            retrieved,
            state.retrieval_iteration,
        );

        let analysis = match execute_structured::<ContextAnalysis>(self, provider, &prompt).await
        {
            Ok(analysis) => analysis,
            Err(e @ (AgentError::ResponseParse { .. } | AgentError::InvalidOutput { .. })) => {
                warn!(error = %e, "context analysis unparseable, treating as sufficient");
                ContextAnalysis::forced_sufficient(
                    vec!["Error parsing context analysis response".to_string()],
                    "Model response was not valid JSON.",
                )
            }
            Err(e) => {
                warn!(error = %e, "context analysis failed, treating as sufficient");
                ContextAnalysis::forced_sufficient(
                    vec![format!("Context analysis error: {e}")],
                    "An error occurred during analysis.",
                )
            }
        };

        debug!(
            is_sufficient = analysis.is_sufficient,
            unanswerable = analysis.unanswerable,
            missing = analysis.missing_aspects.len(),
            "context analyzed"
        );
        Self::settle(state, analysis)
    }

    fn settle(state: PipelineState, analysis: ContextAnalysis) -> PipelineState {
        PipelineState {
            needs_improvement: analysis.needs_improvement(),
            unanswerable: analysis.unanswerable,
            improvement_feedback: Some(analysis.feedback.clone()),
            context_analysis: Some(analysis),
            stage: Stage::ContextAnalysis,
            ..state
        }
    }
}

#[async_trait]
impl Agent for ContextAnalysisAgent {
    fn name(&self) -> &'static str {
        "context_analysis"
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
