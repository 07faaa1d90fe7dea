//! CLI layer for curriculum-compass.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the passage store, importing corpora and asking questions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{Cli, Commands, PromptCommands};
