//! Intent agent: maps a query onto the fields each database must supply.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::build_intent_prompt;
use super::provider::LlmProvider;
use super::schema::{IntentAnalysis, ProcessingStatus};
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Agent that classifies the information a query needs.
pub struct IntentAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl IntentAgent {
    /// Creates a new intent agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.analysis_model.clone(),
            max_tokens: config.analysis_max_tokens,
            system_prompt,
        }
    }

    /// Analyzes `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the call fails, the output does not parse,
    /// or a priority weight lies outside 0–10.
    pub async fn analyze(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<IntentAnalysis, AgentError> {
        execute_structured(self, provider, &build_intent_prompt(query)).await
    }

    /// Records `intent_analysis` and the derived `processing_status`.
    ///
    /// No-op unless the state was validated.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        if !state.valid {
            return state;
        }
        let query = state.effective_query().to_string();

        match self.analyze(provider, &query).await {
            Ok(intent) => {
                let status = ProcessingStatus::from_intent(&intent);
                debug!(
                    primary_intent = ?intent.primary_intent,
                    priority = ?status.priority_source,
                    "intent analyzed"
                );
                PipelineState {
                    intent_analysis: Some(intent),
                    processing_status: Some(status),
                    stage: Stage::IntentAnalysis,
                    ..state
                }
            }
            Err(e) => {
                warn!(error = %e, "intent analysis failed");
                let message = match e {
                    AgentError::ResponseParse { .. } | AgentError::InvalidOutput { .. } => {
                        format!("Failed to parse intent analysis: {e}")
                    }
                    _ => format!("Intent analysis error: {e}"),
                };
                PipelineState {
                    intent_analysis: None,
                    processing_status: None,
                    ..state
                }
                .with_error(Stage::IntentAnalysis, message)
            }
        }
    }
}

#[async_trait]
impl Agent for IntentAgent {
    fn name(&self) -> &'static str {
        "intent"
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
