//! Planner MCP Server implementation

use anyhow::{Context, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use planner_recall::core::config::PlannerConfig;
use planner_recall::core::document::SourceType;
use planner_recall::core::paths::PlannerPaths;
use planner_recall::search::embedding::provider_from_config;
use planner_recall::search::engine::SearchEngine;
use planner_recall::search::store::RecordStore;
use planner_recall::search::vectordb::VectorDB;

/// Upper bound on `limit` for every search tool.
const MAX_LIMIT: usize = 100;

/// Parameters for the search tools
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Natural language search query (e.g., "what did we decide about the budget")
    #[schemars(description = "Natural language search query")]
    pub query: String,
    /// Maximum number of results to return (default: 5)
    #[schemars(description = "Maximum number of results (default: 5, max: 100)")]
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Search result for JSON output
#[derive(Debug, Serialize)]
struct SearchResultJson {
    source_type: SourceType,
    document: String,
    chunk_index: usize,
    text: String,
    score: f64,
}

/// Planner MCP Service
#[derive(Clone)]
pub struct PlannerService {
    paths: PlannerPaths,
    config: PlannerConfig,
    tool_router: ToolRouter<Self>,
}

impl PlannerService {
    pub fn new(paths: PlannerPaths, config: PlannerConfig) -> Self {
        Self {
            paths,
            config,
            tool_router: Self::tool_router(),
        }
    }

    fn open_db(&self) -> Result<VectorDB, McpError> {
        let db_path = self.config.db_path(&self.paths);
        if !db_path.exists() {
            return Err(McpError::internal_error(
                "Index not found. Run `planner index` in the planner directory first.",
                None,
            ));
        }
        VectorDB::open(&db_path)
            .map_err(|e| McpError::internal_error(format!("Failed to open index: {}", e), None))
    }

    fn clamp_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.config.default_top_k).clamp(1, MAX_LIMIT)
    }

    fn search_json(
        &self,
        params: &SearchParams,
        source: Option<SourceType>,
    ) -> Result<String, McpError> {
        let db = self.open_db()?;
        let provider = provider_from_config(&self.config.embedding);
        let limit = self.clamp_limit(params.limit);

        let results = SearchEngine::new(provider.as_ref())
            .search_filtered(&db, &params.query, limit, source)
            .map_err(|e| McpError::internal_error(format!("Search failed: {}", e), None))?;
        debug!(query = %params.query, results = results.len(), "MCP search");

        let json_results: Vec<SearchResultJson> = results
            .into_iter()
            .map(|r| SearchResultJson {
                source_type: r.source_type,
                document: r.parent.id,
                chunk_index: r.chunk_index,
                text: r.chunk_text,
                score: r.score,
            })
            .collect();

        serde_json::to_string_pretty(&json_results).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })
    }

    fn status_json(&self) -> Result<String, McpError> {
        let db = self.open_db()?;
        let stats = db
            .stats()
            .map_err(|e| McpError::internal_error(format!("Failed to read index: {}", e), None))?;

        let output = serde_json::json!({
            "documents": stats.parent_count,
            "records": stats.record_count,
            "meeting_records": stats.meeting_records,
            "note_records": stats.note_records,
            "last_indexed": stats.last_indexed.map(|t| t.to_rfc3339()),
            "provider": self.config.embedding.provider,
        });
        serde_json::to_string_pretty(&output).map_err(|e| {
            McpError::internal_error(format!("JSON serialization failed: {}", e), None)
        })
    }
}

#[tool_router]
impl PlannerService {
    /// Search meetings and notes
    #[tool(description = "Search the planner's meetings and notes using hybrid semantic and keyword matching. Returns the best matching text chunks with their source document and score.")]
    async fn planner_search(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.search_json(&params.0, None)?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Search notes only
    #[tool(description = "Search only the planner's free-form notes.")]
    async fn planner_search_notes(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.search_json(&params.0, Some(SourceType::Note))?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Search meetings only
    #[tool(description = "Search only meeting records: overviews, meeting notes, purposes, outcomes and action items.")]
    async fn planner_query_meetings(
        &self,
        params: Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let output = self.search_json(&params.0, Some(SourceType::Meeting))?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    /// Get index statistics
    #[tool(description = "Get the planner search index status: indexed documents, record counts and last index time.")]
    async fn planner_index_status(&self) -> Result<CallToolResult, McpError> {
        let output = self.status_json()?;
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

#[tool_handler]
impl ServerHandler for PlannerService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Planner recall MCP Server. Searches the meetings and notes of a local planner directory.".to_string()
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(root: PathBuf) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let paths = PlannerPaths::from_root(root);
    let config = PlannerConfig::load(&paths)
        .with_context(|| format!("Failed to load {}", paths.config_file.display()))?;

    let service = PlannerService::new(paths, config);
    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
