//! Agent trait definition and the structured-output parse boundary.
//!
//! Every pipeline stage implements [`Agent`], which supplies the fixed system
//! role and model settings. [`Agent::execute`] is the single text-generation
//! call a stage makes; [`execute_structured`] adds strict parsing and
//! schema validation so each stage receives a tagged
//! `Result<Payload, AgentError>` instead of free-form text.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use super::schema::Validate;
use crate::error::AgentError;

/// Matches a fenced code block, optionally tagged `json`.
static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").ok());

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by every pipeline agent.
///
/// Agents encapsulate a specific role (validation, intent analysis, ...)
/// with a fixed system prompt and model configuration.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        true
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        1024
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures or timeouts.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, AgentError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let response: ChatResponse = provider.chat(&request).await?;
        debug!(
            agent = self.name(),
            total_tokens = response.usage.total_tokens,
            finish_reason = ?response.finish_reason,
            "agent call completed"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Executes an agent and parses its output into a validated payload.
///
/// This is a free function (not on the `Agent` trait) so that `Agent` stays
/// object safe while the payload type varies per call site.
///
/// # Errors
///
/// Returns the provider error unchanged, [`AgentError::ResponseParse`]
/// when the output is not the expected JSON shape, or
/// [`AgentError::InvalidOutput`] when it fails [`Validate::validate`].
pub async fn execute_structured<T>(
    agent: &dyn Agent,
    provider: &dyn LlmProvider,
    user_msg: &str,
) -> Result<T, AgentError>
where
    T: DeserializeOwned + Validate,
{
    let response = agent.execute(provider, user_msg).await?;
    let payload: T = parse_json_payload(&response.content).inspect_err(|e| {
        warn!(agent = agent.name(), error = %e, "unparseable agent output");
    })?;
    payload.validate()?;
    Ok(payload)
}

/// Parses a JSON object out of model output.
///
/// Accepts bare JSON, JSON inside a fenced code block, and JSON surrounded by
/// prose (the first `{` through the last `}`).
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if no candidate deserializes into `T`.
pub fn parse_json_payload<T: DeserializeOwned>(content: &str) -> Result<T, AgentError> {
    let trimmed = content.trim();

    let fenced = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let candidate = fenced.unwrap_or(trimmed);
    let first_err = match serde_json::from_str::<T>(candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (candidate.find('{'), candidate.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<T>(&candidate[start..=end])
    {
        return Ok(value);
    }

    Err(AgentError::ResponseParse {
        message: first_err.to_string(),
        content: content.to_string(),
    })
}
