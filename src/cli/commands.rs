//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

#![allow(clippy::format_push_string)]

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::cli::output::{OutputFormat, format_answer, format_status};
#[cfg(feature = "mcp")]
use crate::cli::parser::McpCommands;
use crate::cli::parser::{Cli, Commands, PromptCommands};
use crate::error::{CommandError, Result, StorageError};
use crate::storage::{Collection, CorpusStore, corpus_retrievers};

/// Parameters for the `ask` command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question to answer.
    pub query: &'a str,
    /// Combined passage budget per attempt.
    pub total_k: Option<usize>,
    /// Refinement loop bound.
    pub max_attempts: Option<usize>,
    /// Model for the analysis agents.
    pub analysis_model: Option<&'a str>,
    /// Model for the response agent.
    pub response_model: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Append the processing history to text output.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Import { collection, file } => cmd_import(&db_path, *collection, file, format),
        Commands::Status => cmd_status(&db_path, format),
        Commands::Ask {
            query,
            total_k,
            max_attempts,
            analysis_model,
            response_model,
            prompt_dir,
        } => {
            let params = AskParams {
                query,
                total_k: *total_k,
                max_attempts: *max_attempts,
                analysis_model: analysis_model.as_deref(),
                response_model: response_model.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
                verbose: cli.verbose,
            };
            cmd_ask(&db_path, &params, format)
        }
        Commands::Prompts(PromptCommands::Init { dir }) => cmd_init_prompts(dir.as_deref(), format),
        #[cfg(feature = "mcp")]
        Commands::Mcp(cmd) => cmd_mcp(cmd, &db_path),
    }
}

/// Opens storage and ensures it's initialized.
fn open_storage(db_path: &Path) -> Result<CorpusStore> {
    let store = CorpusStore::open(db_path)?;

    if !store.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }

    Ok(store)
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create directory: {e}"))
        })?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let store = CorpusStore::open(db_path)?;
    store.init()?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Initialized passage database at: {}\n",
            db_path.display()
        )),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "success": true,
                "path": db_path.to_string_lossy(),
                "force": force
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_import(
    db_path: &Path,
    collection: Collection,
    file: &Path,
    format: OutputFormat,
) -> Result<String> {
    let mut store = open_storage(db_path)?;
    let reader = BufReader::new(File::open(file)?);
    let imported = store.import_jsonl(collection, reader)?;
    let total = store.count(collection)?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Imported {imported} passage(s) into {collection} ({total} total)\n"
        )),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "collection": collection,
                "imported": imported,
                "total": total,
                "file": file.to_string_lossy()
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_status(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_storage(db_path)?;
    let counts = Collection::ALL
        .iter()
        .map(|&c| store.count(c).map(|n| (c, n)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(format_status(&counts, format))
}

fn cmd_ask(db_path: &Path, params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    let store = open_storage(db_path)?;

    let mut builder = AgentConfig::builder().from_env();
    if let Some(k) = params.total_k {
        builder = builder.total_k(k);
    }
    if let Some(n) = params.max_attempts {
        builder = builder.max_retrieval_attempts(n);
    }
    if let Some(model) = params.analysis_model {
        builder = builder.analysis_model(model);
    }
    if let Some(model) = params.response_model {
        builder = builder.response_model(model);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }

    let config = builder.build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    let provider = create_provider(&config)
        .map_err(|e| CommandError::ExecutionFailed(format!("Provider creation failed: {e}")))?;

    let (course, review) = corpus_retrievers(store, config.rerank_pool);
    let orchestrator = Orchestrator::new(Arc::from(provider), course, review, config);

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let state = rt.block_on(orchestrator.process_query(params.query));
    Ok(format_answer(&state, params.verbose, format))
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                output.push_str(&format!(
                    "  {}\n",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown")
                ));
            }
            output.push_str("\nEdit these files to customize agent system prompts.\n");
            Ok(output)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Starts the MCP server with the specified transport.
///
/// Runs until the client disconnects (stdio) or the server is stopped (HTTP).
#[cfg(feature = "mcp")]
fn cmd_mcp(cmd: &McpCommands, db_path: &Path) -> Result<String> {
    use crate::mcp::{CompassMcpServer, serve_http, serve_stdio};

    let server = CompassMcpServer::new(db_path.to_path_buf()).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create MCP server: {e}"))
    })?;

    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    rt.block_on(async {
        match cmd {
            McpCommands::Stdio => serve_stdio(server).await,
            McpCommands::Http { host, port } => serve_http(server, host, *port).await,
        }
    })
    .map_err(|e| CommandError::ExecutionFailed(format!("MCP server error: {e}")))?;

    Ok(String::new())
}
