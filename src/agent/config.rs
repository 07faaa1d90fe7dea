//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.
//! Pipeline bounds (`total_k`, `max_retrieval_attempts`) live here rather than in
//! constants so that differently bounded pipelines can coexist in one process.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default combined retrieval budget across both databases.
pub const DEFAULT_TOTAL_K: usize = 15;
/// Default bound on retrieval → analysis → refinement rounds.
pub const DEFAULT_MAX_RETRIEVAL_ATTEMPTS: usize = 4;
/// Default candidate pool fetched before re-ranking.
const DEFAULT_RERANK_POOL: usize = 10;
/// Default max tokens for the structured (analysis) agents.
const DEFAULT_ANALYSIS_MAX_TOKENS: u32 = 1024;
/// Default max tokens for the response agent.
const DEFAULT_RESPONSE_MAX_TOKENS: u32 = 2048;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the agent pipeline.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for validation, intent, enhancement, strategy and context analysis.
    pub analysis_model: String,
    /// Model for the response agent.
    pub response_model: String,
    /// Maximum tokens for analysis agent responses.
    pub analysis_max_tokens: u32,
    /// Maximum tokens for the response agent.
    pub response_max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Combined result budget: `course_k + review_k` always equals this.
    pub total_k: usize,
    /// Upper bound on retrieval attempts in the refinement loop.
    ///
    /// Also used as the context-analysis iteration guard, so there is a
    /// single worst-case bound on refinement rounds.
    pub max_retrieval_attempts: usize,
    /// Candidates fetched from a database before re-ranking down to `k`.
    pub rerank_pool: usize,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    analysis_model: Option<String>,
    response_model: Option<String>,
    analysis_max_tokens: Option<u32>,
    response_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    total_k: Option<usize>,
    max_retrieval_attempts: Option<usize>,
    rerank_pool: Option<usize>,
    prompt_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("COMPASS_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("COMPASS_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("COMPASS_BASE_URL"))
                .ok();
        }
        if self.analysis_model.is_none() {
            self.analysis_model = std::env::var("COMPASS_ANALYSIS_MODEL").ok();
        }
        if self.response_model.is_none() {
            self.response_model = std::env::var("COMPASS_RESPONSE_MODEL").ok();
        }
        if self.timeout.is_none() {
            self.timeout = env_parse("COMPASS_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.total_k.is_none() {
            self.total_k = env_parse("COMPASS_TOTAL_K");
        }
        if self.max_retrieval_attempts.is_none() {
            self.max_retrieval_attempts = env_parse("COMPASS_MAX_RETRIEVAL_ATTEMPTS");
        }
        if self.rerank_pool.is_none() {
            self.rerank_pool = env_parse("COMPASS_RERANK_POOL");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("COMPASS_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the analysis model.
    #[must_use]
    pub fn analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = Some(model.into());
        self
    }

    /// Sets the response model.
    #[must_use]
    pub fn response_model(mut self, model: impl Into<String>) -> Self {
        self.response_model = Some(model.into());
        self
    }

    /// Sets the analysis max tokens.
    #[must_use]
    pub const fn analysis_max_tokens(mut self, n: u32) -> Self {
        self.analysis_max_tokens = Some(n);
        self
    }

    /// Sets the response max tokens.
    #[must_use]
    pub const fn response_max_tokens(mut self, n: u32) -> Self {
        self.response_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the combined retrieval budget.
    #[must_use]
    pub const fn total_k(mut self, n: usize) -> Self {
        self.total_k = Some(n);
        self
    }

    /// Sets the retrieval attempt bound.
    #[must_use]
    pub const fn max_retrieval_attempts(mut self, n: usize) -> Self {
        self.max_retrieval_attempts = Some(n);
        self
    }

    /// Sets the re-ranking candidate pool.
    #[must_use]
    pub const fn rerank_pool(mut self, n: usize) -> Self {
        self.rerank_pool = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::InvalidConfig`] if `total_k < 2` (each database needs
    /// at least one result) or `max_retrieval_attempts == 0`.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let total_k = self.total_k.unwrap_or(DEFAULT_TOTAL_K);
        if total_k < 2 {
            return Err(AgentError::InvalidConfig {
                message: format!("total_k must be at least 2, got {total_k}"),
            });
        }
        let max_retrieval_attempts = self
            .max_retrieval_attempts
            .unwrap_or(DEFAULT_MAX_RETRIEVAL_ATTEMPTS);
        if max_retrieval_attempts == 0 {
            return Err(AgentError::InvalidConfig {
                message: "max_retrieval_attempts must be at least 1".to_string(),
            });
        }

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            analysis_model: self
                .analysis_model
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            response_model: self.response_model.unwrap_or_else(|| "gpt-4o".to_string()),
            analysis_max_tokens: self
                .analysis_max_tokens
                .unwrap_or(DEFAULT_ANALYSIS_MAX_TOKENS),
            response_max_tokens: self
                .response_max_tokens
                .unwrap_or(DEFAULT_RESPONSE_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            total_k,
            max_retrieval_attempts,
            rerank_pool: self.rerank_pool.unwrap_or(DEFAULT_RERANK_POOL),
            prompt_dir: self.prompt_dir,
        })
    }
}
