//! Connectivity seam between the engine and the database driver.
//!
//! The engine only sees these traits, so the same operation code runs over a
//! fresh connection per call, a pooled connection, or an in-memory fake.

use crate::error::DbResult;
use crate::models::{Row, SqlValue};
use serde_json::Value as JsonValue;
use std::future::Future;

/// Factory for per-operation connections.
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    /// Open (or check out) a connection for exactly one operation.
    fn connect(&self) -> impl Future<Output = DbResult<Self::Conn>> + Send;

    /// Release shared resources on shutdown. Idempotent.
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Short label for logs, e.g. "direct" or "pooled".
    fn strategy(&self) -> &'static str;
}

/// A single live connection, owned by one operation.
pub trait Connection: Send {
    /// Run a statement that returns no rows; yields the command status text
    /// (e.g. `UPDATE 3`).
    fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<String>> + Send;

    /// Run a query and collect every row.
    fn fetch(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// First column of the first row; `Null` when there are no rows.
    fn fetch_scalar(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<JsonValue>> + Send;

    /// First row, if any.
    fn fetch_one(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = DbResult<Option<Row>>> + Send;

    /// Release the connection: close it, or return it to its pool.
    fn close(self) -> impl Future<Output = DbResult<()>> + Send;
}
