//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::storage::Collection;

/// Curriculum Compass: answers course questions from catalogs and reviews.
///
/// Validates the question, analyzes intent, rewrites it for each database,
/// retrieves and refines until the context is sufficient, then answers.
#[derive(Parser, Debug)]
#[command(name = "compass")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the passage database file.
    ///
    /// Defaults to `.compass/passages.db` in the current directory.
    #[arg(short, long, env = "COMPASS_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the passage database.
    ///
    /// Creates the database file and schema if they don't exist.
    #[command(after_help = r#"Examples:
  compass init                    # Initialize in current directory
  compass init --force            # Re-initialize (destroys existing data)
  compass --db-path ./my.db init  # Initialize with custom path
"#)]
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Import passages from a JSON Lines file.
    ///
    /// Each line is either a JSON string or an object with a `text` field.
    #[command(after_help = r#"Examples:
  compass import course catalog.jsonl
  compass import review reviews.jsonl
"#)]
    Import {
        /// Target collection.
        #[arg(value_enum)]
        collection: Collection,

        /// JSON Lines file to read.
        file: PathBuf,
    },

    /// Show passage counts per collection.
    Status,

    /// Answer a course question.
    ///
    /// Requires an OpenAI-compatible API key in `OPENAI_API_KEY`.
    #[command(after_help = r#"Examples:
  compass ask "When does CS 5800 meet?"
  compass ask "Is Algorithms hard?" --total-k 20 --max-attempts 2
  compass --format json ask "Who teaches databases?" | jq '.final_response'
"#)]
    Ask {
        /// The question to answer.
        query: String,

        /// Combined number of passages retrieved per attempt.
        #[arg(long)]
        total_k: Option<usize>,

        /// Maximum retrieval attempts in the refinement loop.
        #[arg(long)]
        max_attempts: Option<usize>,

        /// Model for validation, intent, enhancement, strategy and analysis.
        #[arg(long)]
        analysis_model: Option<String>,

        /// Model for the final answer.
        #[arg(long)]
        response_model: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Prompt template operations.
    #[command(subcommand)]
    Prompts(PromptCommands),

    /// Start MCP (Model Context Protocol) server.
    #[cfg(feature = "mcp")]
    #[command(subcommand)]
    Mcp(McpCommands),
}

/// Prompt template subcommands.
#[derive(Subcommand, Debug)]
pub enum PromptCommands {
    /// Write default prompt templates to disk for customization.
    #[command(after_help = r#"Examples:
  compass prompts init                     # Write to ~/.config/compass/prompts/
  compass prompts init --dir ./my-prompts  # Write to custom directory
"#)]
    Init {
        /// Target directory for prompt templates.
        ///
        /// Defaults to `~/.config/compass/prompts/`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// MCP server subcommands.
#[cfg(feature = "mcp")]
#[derive(Subcommand, Debug)]
pub enum McpCommands {
    /// Serve over stdin/stdout.
    Stdio,

    /// Listens for incoming HTTP connections using streamable HTTP transport.
    #[command(after_help = r#"Examples:
  compass mcp http                            # Listen on 127.0.0.1:3000
  compass mcp http --host 0.0.0.0 --port 8080
"#)]
    Http {
        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to.
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}
