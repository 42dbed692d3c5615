//! Stdio transport for the MCP server.
//!
//! Reads JSON-RPC messages from stdin and writes responses to stdout. Logs
//! must therefore go to stderr.

use crate::db::Connector;
use crate::engine::CrudEngine;
use crate::error::{DbError, DbResult};
use crate::mcp::CrudService;
use crate::tools::ToolRegistry;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StdioTransport<C: Connector> {
    engine: Arc<CrudEngine<C>>,
    registry: Arc<ToolRegistry>,
}

impl<C: Connector> StdioTransport<C> {
    pub fn new(engine: Arc<CrudEngine<C>>, registry: Arc<ToolRegistry>) -> Self {
        Self { engine, registry }
    }
}

impl<C: Connector> Transport for StdioTransport<C> {
    async fn run(&self) -> DbResult<()> {
        info!(
            tools = self.registry.len(),
            strategy = self.engine.connector().strategy(),
            "Starting MCP server with stdio transport"
        );

        let service = CrudService::new(self.engine.clone(), self.registry.clone());
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        self.engine.shutdown().await;
                        return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Releasing database resources");
        self.engine.shutdown().await;

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted by select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
