//! MCP Server for the planner
//!
//! Exposes meeting and note search to assistants over stdio.

mod server;

pub use server::run_mcp_server;
