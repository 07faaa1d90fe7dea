//! Error types for curriculum-compass.
//!
//! Each layer has its own error enum; [`Error`] unifies them for the CLI
//! and the MCP server. Agent-level errors never escape the pipeline: agents
//! convert them into [`PipelineState`](crate::agent::PipelineState) fields.

use thiserror::Error;

/// Convenience result alias using the top-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent or provider failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Passage store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Retrieval collaborator failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by agents, providers and the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or COMPASS_API_KEY")]
    ApiKeyMissing,

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// The provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
    },

    /// The provider API call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// The provider did not answer within the configured timeout.
    #[error("API request timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed.
        seconds: u64,
    },

    /// Model output could not be parsed into the expected structure.
    #[error("failed to parse model output: {message}")]
    ResponseParse {
        /// Parser diagnostic.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// Model output parsed but violates a constraint of the schema.
    #[error("invalid model output: {message}")]
    InvalidOutput {
        /// Violated constraint.
        message: String,
    },

    /// A retrieval collaborator failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    /// The pipeline reached a state it cannot continue from.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description of the broken invariant.
        message: String,
    },
}

/// Errors raised by retrieval and re-ranking collaborators.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backing index failed.
    #[error("{backend} backend error: {message}")]
    Backend {
        /// Backend name (e.g. `"sqlite"`).
        backend: &'static str,
        /// Underlying error message.
        message: String,
    },

    /// Re-ranking failed.
    #[error("rerank failed: {message}")]
    Rerank {
        /// Underlying error message.
        message: String,
    },

    /// The passage store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the SQLite passage store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store schema has not been created.
    #[error("passage store not initialized, run `compass init` first")]
    NotInitialized,

    /// A line of an import file could not be read.
    #[error("import failed at line {line}: {message}")]
    Import {
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        message: String,
    },

    /// I/O failure while reading an import file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed to execute.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),

    /// Argument rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
