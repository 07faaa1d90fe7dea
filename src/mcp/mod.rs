//! MCP (Model Context Protocol) server for curriculum-compass.
//!
//! Exposes the course question pipeline as an MCP tool so external agents
//! can ask course questions without driving the CLI.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! curriculum-compass = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ ask(query)
//! CompassMcpServer
//!   ↓
//! Orchestrator::process_query()
//!   ├── Validation → Intent → Enhancement
//!   ├── Retrieval ⇄ ContextAnalysis (bounded)
//!   └── Response
//!   ↓
//! PipelineState JSON → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::AskParams;
pub use server::CompassMcpServer;
pub use transport::{serve_http, serve_stdio};
