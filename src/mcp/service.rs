//! MCP service implementation using rmcp.
//!
//! [`ServerHandler`] is implemented by hand; the catalog and dispatch both come
//! from the [`ToolRegistry`] shared with the REST endpoint.

use crate::db::{Connector, PgConnector};
use crate::engine::CrudEngine;
use crate::tools::ToolRegistry;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use std::sync::Arc;
use tracing::debug;

pub struct CrudService<C: Connector = PgConnector> {
    engine: Arc<CrudEngine<C>>,
    registry: Arc<ToolRegistry>,
}

impl<C: Connector> Clone for CrudService<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<C: Connector> CrudService<C> {
    pub fn new(engine: Arc<CrudEngine<C>>, registry: Arc<ToolRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one tool call and wrap the envelope as MCP content.
    ///
    /// Failure envelopes are tool-level errors (`is_error`), so the client
    /// still receives the JSON body; only unknown tools are protocol errors.
    pub async fn call(
        &self,
        name: &str,
        arguments: Option<crate::tools::JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let envelope = self
            .registry
            .dispatch(&self.engine, name, arguments.unwrap_or_default())
            .await?;

        let content = vec![Content::text(envelope.to_pretty_json())];
        if envelope.is_success() {
            Ok(CallToolResult::success(content))
        } else {
            Ok(CallToolResult::error(content))
        }
    }
}

impl<C: Connector> ServerHandler for CrudService<C> {
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.registry.mcp_tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        debug!(tool = %request.name, "MCP tool call");
        self.call(&request.name, request.arguments).await
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "pg-crud-mcp".to_owned(),
                title: Some("PostgreSQL CRUD MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "CRUD tools for a PostgreSQL database.\n\
                \n\
                ## Workflow\n\
                1. Call `pg_list_tables` to see the tables in the public schema\n\
                2. Call `pg_describe_table` to see a table's columns and types\n\
                3. Use `pg_create_record`, `pg_read_records`, `pg_update_records`, \
                `pg_delete_records` with column → value objects\n\
                \n\
                ## Notes\n\
                - `conditions` are equality filters combined with AND\n\
                - Update and delete require non-empty `conditions`\n\
                - Every result is a JSON object with a `success` flag; failures carry `error`"
                    .to_string(),
            ),
        }
    }
}
