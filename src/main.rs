//! pg-crud-mcp - Main entry point.
//!
//! Serves parameterized CRUD tools over PostgreSQL tables via MCP (stdio or
//! streamable HTTP) and a REST `/execute` endpoint.

use clap::Parser;
use pg_crud_mcp::auth::BearerAuth;
use pg_crud_mcp::config::{Config, ConnectStrategy, TransportMode};
use pg_crud_mcp::db::{Connector, PgConnector, QueryBuilder};
use pg_crud_mcp::engine::CrudEngine;
use pg_crud_mcp::error::DbResult;
use pg_crud_mcp::tools::ToolRegistry;
use pg_crud_mcp::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Logs go to stderr so they never mix
/// with MCP frames on stdout.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

async fn serve<C: Connector>(config: &Config, connector: C) -> DbResult<()> {
    let builder = QueryBuilder::new(&config.primary_key)?;
    let engine = Arc::new(CrudEngine::new(connector, builder));
    let registry = Arc::new(ToolRegistry::standard()?);

    match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(engine, registry).run().await
        }
        TransportMode::Http => {
            let auth = BearerAuth::from_tokens(&config.auth_tokens)?;
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                auth_tokens = auth.token_count(),
                "Using HTTP transport"
            );
            HttpTransport::new(
                engine,
                registry,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .with_auth(auth)
            .run()
            .await
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);
    config.validate()?;

    let params = config.connect_params()?;
    info!(
        transport = ?config.transport,
        strategy = ?config.connect_strategy,
        target = %params.display_target(),
        user = %params.user,
        "Starting pg-crud-mcp v{}",
        env!("CARGO_PKG_VERSION")
    );

    let timeout = config.connect_timeout_duration();
    let result = match config.connect_strategy {
        ConnectStrategy::Direct => serve(&config, PgConnector::direct(&params, timeout)).await,
        ConnectStrategy::Pooled => {
            let connector = PgConnector::pooled(&params, config.max_connections, timeout);
            serve(&config, connector).await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
