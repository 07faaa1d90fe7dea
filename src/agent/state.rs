//! The record threaded through every pipeline stage.
//!
//! A [`PipelineState`] is created once per query and moved through the
//! stages by value. Each stage returns a new state built from the previous
//! one with struct update syntax; nothing is removed, only added or
//! overwritten by the stage that owns the field.

use std::fmt;

use serde::Serialize;

use super::schema::{
    ContextAnalysis, EnhancedQueries, Feedback, IntentAnalysis, ProcessingStatus, ResponseData,
    RetrievalStrategy, RetrievedInfo,
};

/// Stage marker recorded by the last agent that touched the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fresh state, no agent has run.
    Created,
    /// Validation agent.
    Validation,
    /// Intent agent.
    IntentAnalysis,
    /// Query enhancement, first pass.
    QueryEnhancement,
    /// Query enhancement driven by context-analysis feedback.
    QueryEnhancementRetry,
    /// Strategy selection and retrieval.
    DynamicRetrieval,
    /// Sufficiency judgement.
    ContextAnalysis,
    /// Final answer synthesis.
    ResponseGeneration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Validation => "validation",
            Self::IntentAnalysis => "intent_analysis",
            Self::QueryEnhancement => "query_enhancement",
            Self::QueryEnhancementRetry => "query_enhancement_retry",
            Self::DynamicRetrieval => "dynamic_retrieval",
            Self::ContextAnalysis => "context_analysis",
            Self::ResponseGeneration => "response_generation",
        };
        f.write_str(label)
    }
}

/// A stage-local failure recorded in the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageError {
    /// Stage that failed.
    pub stage: Stage,
    /// Human-readable cause.
    pub message: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

/// Accumulated state for one query.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    /// Raw query as submitted.
    pub query: String,
    /// Query recorded by validation; never changed afterwards.
    pub original_query: Option<String>,
    /// Validation verdict.
    pub valid: bool,
    /// Rejection reason; empty when valid.
    pub reason: String,
    /// Intent analysis.
    pub intent_analysis: Option<IntentAnalysis>,
    /// Summary derived from the intent analysis.
    pub processing_status: Option<ProcessingStatus>,
    /// Current per-database queries.
    pub enhanced_queries: Option<EnhancedQueries>,
    /// Number of feedback-driven re-enhancements.
    pub enhancement_iteration: usize,
    /// Split used by the latest retrieval pass.
    pub retrieval_strategy: Option<RetrievalStrategy>,
    /// Passages from the latest retrieval pass.
    pub retrieved_info: Option<RetrievedInfo>,
    /// Index of the current retrieval attempt; never decreases.
    pub retrieval_iteration: usize,
    /// Latest sufficiency verdict.
    pub context_analysis: Option<ContextAnalysis>,
    /// `!is_sufficient && !unanswerable` of the latest verdict.
    pub needs_improvement: bool,
    /// Set once no further retrieval can help.
    pub unanswerable: bool,
    /// Feedback from the latest verdict.
    pub improvement_feedback: Option<Feedback>,
    /// Structured answer.
    pub response_data: Option<ResponseData>,
    /// Answer shown to the user; always set at a terminal state.
    pub final_response: Option<String>,
    /// Latest stage-local failure.
    pub error: Option<StageError>,
    /// Stage marker of the last agent to run.
    pub stage: Stage,
    /// One line per completed stage or abort.
    pub processing_history: Vec<String>,
}

impl PipelineState {
    /// Creates a fresh state for a query.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            original_query: None,
            valid: false,
            reason: String::new(),
            intent_analysis: None,
            processing_status: None,
            enhanced_queries: None,
            enhancement_iteration: 0,
            retrieval_strategy: None,
            retrieved_info: None,
            retrieval_iteration: 0,
            context_analysis: None,
            needs_improvement: false,
            unanswerable: false,
            improvement_feedback: None,
            response_data: None,
            final_response: None,
            error: None,
            stage: Stage::Created,
            processing_history: Vec::new(),
        }
    }

    /// Query agents should reason about: the validated query if set.
    #[must_use]
    pub fn effective_query(&self) -> &str {
        self.original_query.as_deref().unwrap_or(&self.query)
    }

    /// Returns `true` if a final response exists and no error was recorded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.final_response.is_some() && self.error.is_none()
    }

    /// Returns `true` if the recorded error belongs to `stage`.
    #[must_use]
    pub fn failed_at(&self, stage: Stage) -> bool {
        self.error.as_ref().is_some_and(|e| e.stage == stage)
    }

    /// Returns the state with a history line appended.
    #[must_use]
    pub fn with_history(mut self, line: impl Into<String>) -> Self {
        self.processing_history.push(line.into());
        self
    }

    /// Returns the state with `error` set for `stage`.
    #[must_use]
    pub fn with_error(self, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            error: Some(StageError {
                stage,
                message: message.into(),
            }),
            stage,
            ..self
        }
    }

    /// Serializes the state to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns a serialization error; all fields are plain data so this
    /// only fails on writer errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
