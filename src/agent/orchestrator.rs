//! Orchestrator for the course question pipeline.
//!
//! Sequences the agents into a state machine:
//!
//! ```text
//! Validation → Intent → Enhancement
//!   → loop (≤ max_retrieval_attempts):
//!       Retrieval → ContextAnalysis → [Enhancement from feedback]
//!   → Response
//! ```
//!
//! Validation, intent and first-pass enhancement failures abort with an
//! apology. The loop ends on `unanswerable`, on sufficiency, at the attempt
//! bound, or when retrieval or feedback enhancement fails. Response
//! generation always runs after the loop.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::context::ContextAnalysisAgent;
use super::enhancement::QueryEnhancementAgent;
use super::intent::IntentAgent;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::response::ResponseAgent;
use super::retrieval::DynamicRetrievalAgent;
use super::state::{PipelineState, Stage, StageError};
use super::validation::ValidationAgent;
use crate::error::AgentError;
use crate::retrieval::Retriever;

/// A pipeline-ending failure carrying the state at the point of failure.
struct Abort {
    state: PipelineState,
    message: String,
}

impl Abort {
    fn new(state: PipelineState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

/// Builds the apology shown for an aborted pipeline.
#[must_use]
pub fn error_message(message: &str) -> String {
    format!("I apologize, but I encountered an error: {message}. Please try rephrasing your question.")
}

/// Orchestrates the agent pipeline for one query at a time.
///
/// Holds no per-query state; concurrent calls to
/// [`process_query`](Self::process_query) each get their own
/// [`PipelineState`].
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: PromptSet,
    validation: ValidationAgent,
    intent: IntentAgent,
    enhancement: QueryEnhancementAgent,
    retrieval: DynamicRetrievalAgent,
    context: ContextAnalysisAgent,
    response: ResponseAgent,
}

impl Orchestrator {
    /// Creates an orchestrator over a provider and the two retrievers.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        course: Arc<dyn Retriever>,
        review: Arc<dyn Retriever>,
        config: AgentConfig,
    ) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, course, review, config, prompts)
    }

    /// Creates an orchestrator with an explicit prompt set.
    #[must_use]
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        course: Arc<dyn Retriever>,
        review: Arc<dyn Retriever>,
        config: AgentConfig,
        prompts: PromptSet,
    ) -> Self {
        Self {
            validation: ValidationAgent::new(&config, prompts.validation.clone()),
            intent: IntentAgent::new(&config, prompts.intent.clone()),
            enhancement: QueryEnhancementAgent::new(&config, prompts.enhancement.clone()),
            retrieval: DynamicRetrievalAgent::new(
                &config,
                prompts.retrieval.clone(),
                course,
                review,
            ),
            context: ContextAnalysisAgent::new(&config, prompts.context.clone()),
            response: ResponseAgent::new(&config, prompts.response.clone()),
            provider,
            config,
            prompts,
        }
    }

    /// Configuration this orchestrator was built with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs the full pipeline for `query`.
    ///
    /// Never fails: aborted runs return a state whose `final_response` is an
    /// apology embedding the cause and whose `error` is set.
    pub async fn process_query(&self, query: &str) -> PipelineState {
        let state = match self.run(PipelineState::new(query)).await {
            Ok(state) => state,
            Err(abort) => Self::error_response(abort.state, &abort.message),
        };
        info!(
            success = state.is_success(),
            stage = %state.stage,
            attempts = state.retrieval_iteration + 1,
            "query processed"
        );
        state
    }

    async fn run(&self, state: PipelineState) -> Result<PipelineState, Abort> {
        let provider = self.provider.as_ref();

        let state = self.validation.process(provider, state).await;
        let state = state.with_history(format!("Validation: {}", Stage::Validation));
        if !state.valid {
            let message = format!("Invalid query: {}", state.reason);
            return Err(Abort::new(state, message));
        }

        let state = self.intent.process(provider, state).await;
        if state.failed_at(Stage::IntentAnalysis) || state.intent_analysis.is_none() {
            return Err(Abort::new(state, "Error analyzing query intent"));
        }
        let state = state.with_history(format!("Intent Analysis: {}", Stage::IntentAnalysis));

        let state = self.enhancement.process(provider, state).await;
        if state.failed_at(Stage::QueryEnhancement) || state.enhanced_queries.is_none() {
            return Err(Abort::new(state, "Error enhancing query"));
        }
        let state = state.with_history(format!("Query Enhancement: {}", Stage::QueryEnhancement));

        let state = self.refinement_loop(state).await;

        let state = self.response.process(provider, state).await;
        if state.failed_at(Stage::ResponseGeneration) {
            return Err(Abort::new(state, "Error generating response"));
        }
        if state.final_response.is_none() {
            let e = AgentError::Orchestration {
                message: "response stage produced no answer".to_string(),
            };
            return Err(Abort::new(state, format!("System error: {e}")));
        }
        Ok(state.with_history(format!(
            "Response Generation: {}",
            Stage::ResponseGeneration
        )))
    }

    /// Retrieval → analysis → feedback enhancement, bounded by
    /// `max_retrieval_attempts`.
    async fn refinement_loop(&self, mut state: PipelineState) -> PipelineState {
        let provider = self.provider.as_ref();
        let max_attempts = self.config.max_retrieval_attempts;

        for attempt in 0..max_attempts {
            let n = attempt + 1;
            state = PipelineState {
                retrieval_iteration: attempt.max(state.retrieval_iteration),
                ..state
            };

            state = self.retrieval.process(provider, state).await;
            if state.failed_at(Stage::DynamicRetrieval) {
                warn!(attempt = n, "retrieval failed, leaving refinement loop");
                return state.with_history(format!("Retrieval attempt {n} failed"));
            }
            state = state.with_history(format!("Retrieval attempt {n}: {}", Stage::DynamicRetrieval));

            state = self.context.process(provider, state).await;
            state = state.with_history(format!("Context Analysis {n}: {}", Stage::ContextAnalysis));

            if state.unanswerable {
                info!(attempt = n, "query judged unanswerable");
                break;
            }
            if !state.needs_improvement {
                debug!(attempt = n, "retrieved context sufficient");
                break;
            }
            if n == max_attempts {
                info!(attempt = n, "retrieval attempt bound reached");
                break;
            }

            let feedback = state.improvement_feedback.clone().unwrap_or_default();
            state = self
                .enhancement
                .process_feedback(provider, state, &feedback)
                .await;
            if state.failed_at(Stage::QueryEnhancementRetry) {
                warn!(attempt = n, "feedback enhancement failed, leaving refinement loop");
                break;
            }
            state = state.with_history(format!(
                "Query Refinement {n}: {}",
                Stage::QueryEnhancementRetry
            ));
        }

        state
    }

    /// Merges `message` into the state and records an apology.
    fn error_response(state: PipelineState, message: &str) -> PipelineState {
        warn!(error = message, stage = %state.stage, "pipeline aborted");
        let error = state.error.clone().unwrap_or_else(|| StageError {
            stage: state.stage,
            message: message.to_string(),
        });
        PipelineState {
            final_response: Some(error_message(message)),
            error: Some(error),
            ..state
        }
        .with_history(format!("Error: {message}"))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("prompts", &self.prompts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{ScriptedProvider, StubRetriever};
    use std::sync::atomic::Ordering;

    const VALID: &str = r#"{"is_valid": true, "reason": ""}"#;
    const INTENT: &str = r#"{
        "primary_intent": "combined",
        "required_fields": {"course_db": ["schedule"], "review_db": ["general_feedback"]},
        "priority": {"course_info_weight": 6, "review_info_weight": 4},
        "specific_aspects": ["schedule"],
        "reasoning": "r"
    }"#;
    const QUERIES: &str = r#"{"course_db_query": "cs 5800 schedule", "review_db_query": "cs 5800 reviews"}"#;
    const STRATEGY: &str = r#"{"course_k": 10, "review_k": 5, "priority_source": "course_db"}"#;
    const SUFFICIENT: &str = r#"{"is_sufficient": true, "unanswerable": false}"#;
    const INSUFFICIENT: &str = r#"{"is_sufficient": false, "unanswerable": false, "missing_aspects": ["time"]}"#;
    const ANSWER: &str = r#"{"response": "It meets MWF."}"#;

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        course: Arc<StubRetriever>,
        attempts: usize,
    ) -> Orchestrator {
        let config = AgentConfig::builder()
            .api_key("test")
            .max_retrieval_attempts(attempts)
            .build()
            .unwrap_or_else(|_| unreachable!());
        Orchestrator::with_prompts(
            provider,
            course,
            Arc::new(StubRetriever::with_passages("review", 3)),
            config,
            PromptSet::defaults(),
        )
    }

    #[tokio::test]
    async fn test_happy_path() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            VALID, INTENT, QUERIES, STRATEGY, SUFFICIENT, ANSWER,
        ]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider.clone(), course, 4)
            .process_query("When does CS 5800 meet?")
            .await;

        assert!(state.is_success());
        assert_eq!(state.final_response.as_deref(), Some("It meets MWF."));
        assert_eq!(state.stage, Stage::ResponseGeneration);
        assert_eq!(state.retrieval_iteration, 0);
        assert_eq!(provider.calls(), 6);
        assert_eq!(
            state.processing_history.last().map(String::as_str),
            Some("Response Generation: response_generation")
        );
    }

    #[tokio::test]
    async fn test_invalid_query_aborts() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            r#"{"is_valid": false, "reason": "not about courses"}"#,
        ]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider.clone(), course.clone(), 4)
            .process_query("What's the weather today?")
            .await;

        assert!(!state.valid);
        assert_eq!(
            state.final_response.as_deref(),
            Some(
                "I apologize, but I encountered an error: Invalid query: not about courses. \
                 Please try rephrasing your question."
            )
        );
        assert_eq!(provider.calls(), 1);
        assert_eq!(course.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            state.processing_history.last().map(String::as_str),
            Some("Error: Invalid query: not about courses")
        );
    }

    #[tokio::test]
    async fn test_intent_failure_aborts() {
        let provider = Arc::new(ScriptedProvider::replying(&[VALID, "nope"]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider, course, 4).process_query("q").await;
        assert!(state.failed_at(Stage::IntentAnalysis));
        assert!(
            state
                .final_response
                .unwrap_or_default()
                .contains("Error analyzing query intent")
        );
    }

    #[tokio::test]
    async fn test_enhancement_failure_aborts() {
        let provider = Arc::new(ScriptedProvider::replying(&[VALID, INTENT, "{}"]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider, course.clone(), 4).process_query("q").await;
        assert!(state.failed_at(Stage::QueryEnhancement));
        assert!(
            state
                .final_response
                .unwrap_or_default()
                .contains("Error enhancing query")
        );
        assert_eq!(course.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_attempt_bound() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            VALID,
            INTENT,
            QUERIES,
            STRATEGY,
            INSUFFICIENT,
            QUERIES,
            STRATEGY,
            INSUFFICIENT,
            ANSWER,
        ]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider.clone(), course.clone(), 2)
            .process_query("q")
            .await;

        assert!(state.needs_improvement);
        assert_eq!(state.retrieval_iteration, 1);
        assert_eq!(state.enhancement_iteration, 1);
        assert_eq!(course.calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.final_response.as_deref(), Some("It meets MWF."));
        assert_eq!(provider.calls(), 9);
    }

    #[tokio::test]
    async fn test_feedback_failure_leaves_loop() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            VALID,
            INTENT,
            QUERIES,
            STRATEGY,
            INSUFFICIENT,
            "broken",
            ANSWER,
        ]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider, course.clone(), 4).process_query("q").await;

        assert_eq!(course.calls.load(Ordering::SeqCst), 1);
        assert!(state.failed_at(Stage::QueryEnhancementRetry));
        assert_eq!(state.stage, Stage::ResponseGeneration);
        assert_eq!(state.final_response.as_deref(), Some("It meets MWF."));
        let queries = state.enhanced_queries.unwrap_or_else(|| unreachable!());
        assert_eq!(queries.course_db_query, "cs 5800 schedule");
    }

    #[tokio::test]
    async fn test_response_failure_is_terminal_error() {
        let provider = Arc::new(ScriptedProvider::replying(&[
            VALID, INTENT, QUERIES, STRATEGY, SUFFICIENT, "???",
        ]));
        let course = Arc::new(StubRetriever::with_passages("course", 3));
        let state = orchestrator(provider, course, 4).process_query("q").await;
        assert!(!state.is_success());
        assert_eq!(
            state.final_response.as_deref(),
            Some(error_message("Error generating response").as_str())
        );
    }
}
