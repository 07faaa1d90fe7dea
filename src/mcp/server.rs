//! MCP server implementation for curriculum-compass.
//!
//! Exposes the course question pipeline and corpus status as MCP tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};

use crate::agent::client::create_provider;
use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::error::{CommandError, StorageError};
use crate::storage::{Collection, CorpusStore, corpus_retrievers};

use super::params::AskParams;

fn open_storage(db_path: &Path) -> Result<CorpusStore, crate::error::Error> {
    let store = CorpusStore::open(db_path)?;
    if !store.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }
    Ok(store)
}

/// Curriculum Compass MCP server.
#[derive(Clone)]
pub struct CompassMcpServer {
    tool_router: ToolRouter<Self>,
    db_path: PathBuf,
    orchestrator: Arc<Orchestrator>,
}

#[tool_router]
impl CompassMcpServer {
    /// Answer a course question with the full agent pipeline.
    #[tool(
        name = "ask",
        description = "Answer a university course question. Validates the question, analyzes intent, rewrites it for the course catalog and the student review database, retrieves and refines until the context is sufficient, then writes an answer. Returns JSON with the answer, or the full pipeline state when include_state is true."
    )]
    async fn ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        let state = self.orchestrator.process_query(&params.query).await;

        let json = if params.include_state {
            serde_json::to_string_pretty(&state)
        } else {
            serde_json::to_string_pretty(&serde_json::json!({
                "response": state.final_response,
                "success": state.is_success(),
                "error": state.error.as_ref().map(ToString::to_string),
            }))
        }
        .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// Report passage counts per collection.
    #[tool(
        name = "status",
        description = "Report how many course and review passages are indexed."
    )]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        let db_path = self.db_path.clone();

        let counts = tokio::task::spawn_blocking(move || {
            let store = open_storage(&db_path)
                .map_err(|e| McpError::internal_error(format!("Storage error: {e}"), None))?;
            let mut counts = serde_json::Map::new();
            for collection in Collection::ALL {
                let n = store.count(collection).map_err(|e| {
                    McpError::internal_error(format!("Storage error: {e}"), None)
                })?;
                counts.insert(collection.as_str().to_string(), n.into());
            }
            Ok::<_, McpError>(counts)
        })
        .await
        .map_err(|e| McpError::internal_error(format!("Task join error: {e}"), None))??;

        let json = serde_json::to_string_pretty(&serde_json::json!({ "passages": counts }))
            .map_err(|e| McpError::internal_error(format!("Serialization error: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl ServerHandler for CompassMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "curriculum-compass".to_string(),
                title: Some("Curriculum Compass MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Curriculum Compass answers questions about university courses from a course \
                 catalog and student reviews. Use the `ask` tool with the student's question."
                    .to_string(),
            ),
        }
    }
}

impl CompassMcpServer {
    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Creates a new MCP server over the passage database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is not initialized, the agent
    /// configuration cannot be loaded from environment variables, or the
    /// LLM provider cannot be created.
    pub fn new(db_path: PathBuf) -> Result<Self, crate::error::Error> {
        let store = open_storage(&db_path)?;

        let config = AgentConfig::from_env().map_err(|e| {
            CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
        })?;

        let provider = create_provider(&config)
            .map_err(|e| CommandError::ExecutionFailed(format!("Provider creation failed: {e}")))?;

        let (course, review) = corpus_retrievers(store, config.rerank_pool);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::from(provider),
            course,
            review,
            config,
        ));

        Ok(Self {
            tool_router: Self::tool_router(),
            db_path,
            orchestrator,
        })
    }
}
