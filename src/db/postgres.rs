//! PostgreSQL connectivity via sqlx.
//!
//! Two strategies share one [`Connector`] implementation:
//! - `Direct` opens a fresh `PgConnection` per operation and closes it after;
//! - `Pooled` checks a connection out of a lazily-connected `PgPool` and
//!   returns it to the pool on release.

use crate::db::connection::{Connection, Connector};
use crate::db::params::{PgParam, bind_all, coerce_params};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{Row, SqlValue};
use serde_json::Value as JsonValue;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::{ConnectOptions, Connection as _, Either, Executor, Postgres, Statement};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Explicit connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectParams {
    pub fn to_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }

    /// `host:port/database`, safe to log.
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field(
                "password",
                &if self.password.is_empty() { "" } else { "***" },
            )
            .field("database", &self.database)
            .finish()
    }
}

/// Map errors raised while opening a connection. These are always
/// connection failures, even when the server answered with an error code.
fn connect_error(err: sqlx::Error, target: &str) -> DbError {
    let suggestion = match &err {
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("28P01") | Some("28000") => "Check --db-user and --db-password",
            Some("3D000") => "Check --db-name; the database does not exist",
            _ => "Check the connection parameters and server logs",
        },
        sqlx::Error::PoolTimedOut => "Raise --max-connections or --connect-timeout",
        _ => "Check that PostgreSQL is running and reachable",
    };
    let message = match &err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    };
    DbError::connection(format!("{} ({})", message, target), suggestion)
}

/// sqlx-backed connector.
#[derive(Debug, Clone)]
pub enum PgConnector {
    Direct {
        options: PgConnectOptions,
        target: String,
        connect_timeout: Duration,
    },
    Pooled {
        pool: PgPool,
        target: String,
    },
}

impl PgConnector {
    /// One connection per operation.
    pub fn direct(params: &ConnectParams, connect_timeout: Duration) -> Self {
        Self::Direct {
            options: params.to_options(),
            target: params.display_target(),
            connect_timeout,
        }
    }

    /// Lazily-connected pool; no I/O happens until the first operation.
    pub fn pooled(params: &ConnectParams, max_connections: u32, acquire_timeout: Duration) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(params.to_options());
        Self::Pooled {
            pool,
            target: params.display_target(),
        }
    }

    fn target(&self) -> &str {
        match self {
            Self::Direct { target, .. } | Self::Pooled { target, .. } => target,
        }
    }
}

impl Connector for PgConnector {
    type Conn = PgConn;

    async fn connect(&self) -> DbResult<PgConn> {
        match self {
            Self::Direct {
                options,
                connect_timeout,
                ..
            } => {
                let conn = tokio::time::timeout(*connect_timeout, options.connect())
                    .await
                    .map_err(|_| DbError::timeout("connect", connect_timeout.as_secs()))?
                    .map_err(|e| connect_error(e, self.target()))?;
                Ok(PgConn::Direct(conn))
            }
            Self::Pooled { pool, .. } => {
                let conn = pool
                    .acquire()
                    .await
                    .map_err(|e| connect_error(e, self.target()))?;
                Ok(PgConn::Pooled(conn))
            }
        }
    }

    async fn shutdown(&self) {
        if let Self::Pooled { pool, .. } = self {
            debug!("Closing connection pool");
            pool.close().await;
        }
    }

    fn strategy(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::Pooled { .. } => "pooled",
        }
    }
}

/// A connection held for one operation.
#[derive(Debug)]
pub enum PgConn {
    Direct(PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl PgConn {
    fn raw(&mut self) -> &mut PgConnection {
        match self {
            Self::Direct(conn) => conn,
            Self::Pooled(conn) => &mut **conn,
        }
    }

    /// Shape parameters for the statement's inferred placeholder types.
    ///
    /// Only string values depend on the target type, so statements without
    /// one skip the extra describe round trip. The described statement is
    /// evicted again so the next execution re-parses with the bound types.
    async fn prepare_params(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<PgParam>> {
        if !params.iter().any(|p| matches!(p, SqlValue::String(_))) {
            return Ok(params.iter().map(PgParam::from).collect());
        }

        let conn = self.raw();
        let statement = (&mut *conn).prepare_with(sql, &[]).await?;
        let slots = match statement.parameters() {
            Some(Either::Left(types)) => types.to_vec(),
            _ => Vec::new(),
        };
        conn.clear_cached_statements().await?;

        coerce_params(params, &slots)
    }

    /// Bind the shaped parameters to an unnamed (non-cached) statement.
    async fn query<'q>(
        &mut self,
        sql: &'q str,
        params: &[SqlValue],
    ) -> DbResult<sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>> {
        let params = self.prepare_params(sql, params).await?;
        Ok(bind_all(sqlx::query(sql).persistent(false), params))
    }
}

/// Command status text in PostgreSQL's command-tag shape.
///
/// sqlx exposes only the affected row count, so the tag is rebuilt from the
/// statement's leading keyword.
pub fn command_status(sql: &str, rows_affected: u64) -> String {
    let keyword = sql
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "INSERT" => format!("INSERT 0 {}", rows_affected),
        "" => format!("{}", rows_affected),
        _ => format!("{} {}", keyword, rows_affected),
    }
}

impl Connection for PgConn {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<String> {
        let query = self.query(sql, params).await?;
        let result = query.execute(self.raw()).await?;
        Ok(command_status(sql, result.rows_affected()))
    }

    async fn fetch(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        let query = self.query(sql, params).await?;
        let rows = query.fetch_all(self.raw()).await?;
        Ok(rows.iter().map(|row| row.to_json_map()).collect())
    }

    async fn fetch_scalar(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<JsonValue> {
        let query = self.query(sql, params).await?;
        let row = query.fetch_optional(self.raw()).await?;
        Ok(row.map(|r| r.first_value()).unwrap_or(JsonValue::Null))
    }

    async fn fetch_one(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Row>> {
        let query = self.query(sql, params).await?;
        let row = query.fetch_optional(self.raw()).await?;
        Ok(row.map(|r| r.to_json_map()))
    }

    async fn close(self) -> DbResult<()> {
        match self {
            Self::Direct(conn) => conn.close().await.map_err(DbError::from),
            // Dropping returns the connection to its pool.
            Self::Pooled(conn) => {
                drop(conn);
                Ok(())
            }
        }
    }
}
