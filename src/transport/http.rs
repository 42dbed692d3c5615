//! HTTP transport.
//!
//! One listener serves:
//! - `POST /execute`: `{"tool_name", "arguments"}` → result envelope
//! - `GET /tools`: the tool catalog
//! - the MCP streamable HTTP endpoint (default `/mcp`)
//!
//! Optional bearer authentication wraps all three.

use crate::auth::{BearerAuth, require_bearer};
use crate::db::Connector;
use crate::engine::CrudEngine;
use crate::error::{DbError, DbResult, ErrorKind};
use crate::mcp::CrudService;
use crate::tools::{JsonObject, ToolDescriptor, ToolRegistry};
use crate::transport::{Transport, wait_for_signal};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Shared handler state.
pub struct AppState<C: Connector> {
    pub engine: Arc<CrudEngine<C>>,
    pub registry: Arc<ToolRegistry>,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(engine: Arc<CrudEngine<C>>, registry: Arc<ToolRegistry>) -> Self {
        Self { engine, registry }
    }
}

/// Body of `POST /execute`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Option<JsonObject>,
}

/// HTTP status for a failure kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::ConnectionFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::ExecutionFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn detail_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": detail }))).into_response()
}

/// `POST /execute`
pub async fn execute_tool<C: Connector>(
    State(state): State<AppState<C>>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed execute request");
            return detail_response(rejection.status(), &rejection.body_text());
        }
    };

    info!(tool = %request.tool_name, "HTTP tool call");
    let result = state
        .registry
        .dispatch(
            &state.engine,
            &request.tool_name,
            request.arguments.unwrap_or_default(),
        )
        .await;

    match result {
        Ok(envelope) => match envelope.error_kind() {
            None => (StatusCode::OK, Json(envelope)).into_response(),
            Some(kind) => detail_response(
                status_for(kind),
                envelope.error_message().unwrap_or_default(),
            ),
        },
        Err(err) => detail_response(status_for(err.kind()), &err.to_string()),
    }
}

/// `GET /tools`
pub async fn list_tools<C: Connector>(
    State(state): State<AppState<C>>,
) -> Json<Vec<ToolDescriptor>> {
    Json(state.registry.descriptors().to_vec())
}

pub struct HttpTransport<C: Connector> {
    engine: Arc<CrudEngine<C>>,
    registry: Arc<ToolRegistry>,
    auth: Arc<BearerAuth>,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl<C: Connector> HttpTransport<C> {
    pub fn new(
        engine: Arc<CrudEngine<C>>,
        registry: Arc<ToolRegistry>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            registry,
            auth: Arc::new(BearerAuth::default()),
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn with_auth(mut self, auth: BearerAuth) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Assemble the full router: REST routes, MCP service, optional auth.
    pub fn router(&self) -> Router {
        let engine = self.engine.clone();
        let registry = self.registry.clone();
        let mcp_service = StreamableHttpService::new(
            move || Ok(CrudService::new(engine.clone(), registry.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let app = Router::new()
            .route("/execute", post(execute_tool::<C>))
            .route("/tools", get(list_tools::<C>))
            .with_state(AppState::new(self.engine.clone(), self.registry.clone()));

        // nest_service doesn't accept the root path
        let app = if self.endpoint == "/" {
            app.fallback_service(mcp_service)
        } else {
            app.nest_service(&self.endpoint, mcp_service)
        };

        if self.auth.is_enabled() {
            app.layer(middleware::from_fn_with_state(
                self.auth.clone(),
                require_bearer,
            ))
        } else {
            app
        }
    }
}

impl<C: Connector> Transport for HttpTransport<C> {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!(
            tools = self.registry.len(),
            strategy = self.engine.connector().strategy(),
            auth = self.auth.is_enabled(),
            "Starting HTTP server on {}",
            bind_addr
        );

        let app = self.router();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::internal(format!(
                "Failed to bind to {}: {}. Check that the port is available",
                bind_addr, e
            ))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready; REST at /execute and /tools");

        // Streaming MCP sessions may keep the server alive indefinitely, so
        // exit is forced after this long once shutdown starts.
        const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();
        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        self.engine.shutdown().await;
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );
                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Releasing database resources");
        self.engine.shutdown().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
