//! Response agent: synthesizes the final answer.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::build_response_prompt;
use super::provider::LlmProvider;
use super::schema::ResponseData;
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Answer given when retrieval or analysis never produced anything.
pub const MISSING_INFO_RESPONSE: &str =
    "I apologize, but I'm unable to provide a response due to missing information.";
/// Answer given when the model output cannot be parsed.
pub const PARSE_FAILURE_RESPONSE: &str = "I apologize, but I encountered an error while generating the response. Please try rephrasing your question.";
/// Answer given when the model call fails.
pub const CALL_FAILURE_RESPONSE: &str =
    "I apologize, but I encountered an error while generating the response. Please try again.";

/// Agent that writes the user-facing answer.
pub struct ResponseAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ResponseAgent {
    /// Creates a new response agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.response_model.clone(),
            max_tokens: config.response_max_tokens,
            system_prompt,
        }
    }

    /// Records `response_data` and `final_response`.
    ///
    /// Without both `retrieved_info` and `context_analysis` a fixed apology
    /// is recorded and the model is not called.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        let (Some(retrieved), Some(analysis)) =
            (state.retrieved_info.as_ref(), state.context_analysis.as_ref())
        else {
            debug!("missing retrieval context, skipping generation");
            return PipelineState {
                final_response: Some(MISSING_INFO_RESPONSE.to_string()),
                stage: Stage::ResponseGeneration,
                ..state
            };
        };

        let prompt = build_response_prompt(
            state.effective_query(),
            state.intent_analysis.as_ref(),
            retrieved,
            analysis,
        );

        match execute_structured::<ResponseData>(self, provider, &prompt).await {
            Ok(data) => {
                let final_response = data.render();
                PipelineState {
                    response_data: Some(data),
                    final_response: Some(final_response),
                    stage: Stage::ResponseGeneration,
                    ..state
                }
            }
            Err(e) => {
                warn!(error = %e, "response generation failed");
                let (apology, message) = match e {
                    AgentError::ResponseParse { .. } | AgentError::InvalidOutput { .. } => {
                        (PARSE_FAILURE_RESPONSE, format!("Failed to parse response: {e}"))
                    }
                    _ => (CALL_FAILURE_RESPONSE, format!("Response generation error: {e}")),
                };
                PipelineState {
                    final_response: Some(apology.to_string()),
                    ..state
                }
                .with_error(Stage::ResponseGeneration, message)
            }
        }
    }
}

#[async_trait]
impl Agent for ResponseAgent {
    fn name(&self) -> &'static str {
        "response"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.1
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::schema::{ContextAnalysis, RetrievedInfo};
    use crate::agent::testing::ScriptedProvider;
    use crate::retrieval::Passage;

    fn agent() -> ResponseAgent {
        let config = AgentConfig::builder()
            .api_key("test")
            .response_model("big")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ResponseAgent::new(&config, "advisor".to_string())
    }

    fn ready() -> PipelineState {
        PipelineState {
            valid: true,
            retrieved_info: Some(RetrievedInfo {
                course_info: Vec::new(),
                review_info: vec![Passage::new("Exams are brutal", 2.0)],
            }),
            context_analysis: Some(ContextAnalysis::forced_sufficient(Vec::new(), "ok")),
            ..PipelineState::new("How hard is algorithms?")
        }
    }

    #[test]
    fn test_agent_properties() {
        let a = agent();
        assert_eq!(a.name(), "response");
        assert_eq!(a.model(), "big");
        assert!(a.json_mode());
    }

    #[tokio::test]
    async fn test_renders_final_response() {
        let provider = ScriptedProvider::replying(&[r#"{
            "response": "Students find it hard.",
            "has_limitations": true,
            "limitation_notes": ["only one review"],
            "additional_suggestions": ["Ask the instructor for past exams"]
        }"#]);
        let state = agent().process(&provider, ready()).await;
        assert_eq!(
            state.final_response.as_deref(),
            Some(
                "Students find it hard.\n\nNote: only one review\n\n\
                 Additional suggestions:\n- Ask the instructor for past exams"
            )
        );
        assert!(state.is_success());
        assert!(provider.last_prompt().contains("Exams are brutal"));
    }

    #[tokio::test]
    async fn test_missing_context_skips_model() {
        let provider = ScriptedProvider::replying(&[]);
        let state = agent().process(&provider, PipelineState::new("q")).await;
        assert_eq!(state.final_response.as_deref(), Some(MISSING_INFO_RESPONSE));
        assert!(state.error.is_none());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_apologizes() {
        let provider = ScriptedProvider::replying(&["Students find it hard."]);
        let state = agent().process(&provider, ready()).await;
        assert_eq!(state.final_response.as_deref(), Some(PARSE_FAILURE_RESPONSE));
        assert!(state.failed_at(Stage::ResponseGeneration));
    }

    #[tokio::test]
    async fn test_call_failure_apologizes() {
        let provider = ScriptedProvider::new(vec![Err(AgentError::ApiRequest {
            message: "503".to_string(),
            status: Some(503),
        })]);
        let state = agent().process(&provider, ready()).await;
        assert_eq!(state.final_response.as_deref(), Some(CALL_FAILURE_RESPONSE));
        assert!(!state.is_success());
    }
}
