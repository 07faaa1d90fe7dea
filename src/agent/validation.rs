//! Validation agent: admits or rejects a raw query.
//!
//! Fails closed. Anything other than an explicit, well-formed acceptance
//! from the model leaves `valid = false`.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::prompt::build_validation_prompt;
use super::provider::LlmProvider;
use super::schema::ValidationVerdict;
use super::state::{PipelineState, Stage};
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Longest query accepted, in bytes.
pub const MAX_QUERY_BYTES: usize = 10_000;

/// Agent that decides whether a query is in scope.
pub struct ValidationAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ValidationAgent {
    /// Creates a new validation agent.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.analysis_model.clone(),
            max_tokens: config.analysis_max_tokens,
            system_prompt,
        }
    }

    /// Returns the verdict for `query`.
    ///
    /// Empty and oversized queries are rejected without a model call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the model call fails or its output cannot
    /// be parsed.
    pub async fn check(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
    ) -> Result<ValidationVerdict, AgentError> {
        if query.trim().is_empty() {
            return Ok(ValidationVerdict {
                is_valid: false,
                reason: "Query is empty".to_string(),
            });
        }
        if query.len() > MAX_QUERY_BYTES {
            return Ok(ValidationVerdict {
                is_valid: false,
                reason: format!("Query exceeds {MAX_QUERY_BYTES} bytes"),
            });
        }
        execute_structured(self, provider, &build_validation_prompt(query)).await
    }

    /// Runs validation and records `valid`, `reason` and `original_query`.
    pub async fn process(&self, provider: &dyn LlmProvider, state: PipelineState) -> PipelineState {
        let query = state.query.clone();

        let (valid, reason) = match self.check(provider, &query).await {
            Ok(verdict) if verdict.is_valid => (true, String::new()),
            Ok(verdict) if verdict.reason.trim().is_empty() => (
                false,
                "Query is not about university courses".to_string(),
            ),
            Ok(verdict) => (false, verdict.reason),
            Err(e @ (AgentError::ResponseParse { .. } | AgentError::InvalidOutput { .. })) => {
                warn!(error = %e, "validation output unusable, rejecting query");
                (false, "Error in validation process".to_string())
            }
            Err(e) => {
                warn!(error = %e, "validation call failed, rejecting query");
                (false, format!("Validation error: {e}"))
            }
        };
        debug!(valid, "validation complete");

        PipelineState {
            original_query: Some(query),
            valid,
            reason,
            stage: Stage::Validation,
            ..state
        }
    }
}

#[async_trait]
impl Agent for ValidationAgent {
    fn name(&self) -> &'static str {
        "validation"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedProvider;

    fn agent() -> ValidationAgent {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        ValidationAgent::new(&config, "validator".to_string())
    }

    #[tokio::test]
    async fn test_accepts_valid_query() {
        let provider = ScriptedProvider::replying(&[r#"{"is_valid": true, "reason": ""}"#]);
        let state = agent()
            .process(&provider, PipelineState::new("Who teaches CS 5800?"))
            .await;
        assert!(state.valid);
        assert!(state.reason.is_empty());
        assert_eq!(state.original_query.as_deref(), Some("Who teaches CS 5800?"));
        assert_eq!(state.stage, Stage::Validation);
    }

    #[tokio::test]
    async fn test_rejects_with_reason() {
        let provider = ScriptedProvider::replying(&[
            r#"{"is_valid": false, "reason": "Weather is not a course topic"}"#,
        ]);
        let state = agent()
            .process(&provider, PipelineState::new("What's the weather today?"))
            .await;
        assert!(!state.valid);
        assert_eq!(state.reason, "Weather is not a course topic");
    }

    #[tokio::test]
    async fn test_parse_failure_fails_closed() {
        let provider = ScriptedProvider::replying(&["sure, that looks fine"]);
        let state = agent().process(&provider, PipelineState::new("q")).await;
        assert!(!state.valid);
        assert_eq!(state.reason, "Error in validation process");
    }

    #[tokio::test]
    async fn test_provider_failure_fails_closed() {
        let provider = ScriptedProvider::new(vec![Err(AgentError::Timeout { seconds: 5 })]);
        let state = agent().process(&provider, PipelineState::new("q")).await;
        assert!(!state.valid);
        assert!(state.reason.starts_with("Validation error:"));
    }

    #[tokio::test]
    async fn test_empty_and_oversized_skip_model() {
        let provider = ScriptedProvider::replying(&[]);
        let a = agent();

        let state = a.process(&provider, PipelineState::new("   ")).await;
        assert!(!state.valid);

        let long = "a".repeat(MAX_QUERY_BYTES + 1);
        let state = a.process(&provider, PipelineState::new(long)).await;
        assert!(!state.valid);
        assert!(state.reason.contains("10000"));

        assert_eq!(provider.calls(), 0);
    }
}
