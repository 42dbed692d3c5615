//! The CRUD engine.
//!
//! Each operation follows the same lifecycle: build the statement, acquire a
//! connection, execute, release. Argument errors surface while building, so no
//! connection is opened for them. The connection is released on every path
//! after acquisition, and every error is folded into a failure [`Envelope`]
//! at the operation boundary.

use crate::db::{Connection, Connector, PgConnector, QueryBuilder};
use crate::error::{DbError, DbResult, ErrorKind};
use crate::models::{ColumnDescriptor, ColumnValues, Envelope};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

/// Acquire a connection, evaluate `$body` against it, and release it
/// regardless of the outcome.
macro_rules! with_connection {
    ($engine:expr, $op:expr, $fragment:ident, |$conn:ident| $body:expr) => {{
        debug!(
            operation = $op,
            sql = %$fragment.sql,
            params = $fragment.params.len(),
            "Executing statement"
        );
        let mut $conn = $engine.connector.connect().await?;
        let result = $body.await;
        if let Err(e) = $conn.close().await {
            warn!(operation = $op, error = %e, "Failed to release connection");
        }
        result
    }};
}

pub struct CrudEngine<C: Connector = PgConnector> {
    connector: C,
    builder: QueryBuilder,
}

impl<C: Connector> CrudEngine<C> {
    pub fn new(connector: C, builder: QueryBuilder) -> Self {
        Self { connector, builder }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Release connector resources (closes the pool, if any).
    pub async fn shutdown(&self) {
        self.connector.shutdown().await;
    }

    /// Insert one row; success carries the generated primary key.
    pub async fn create_record(&self, table: &str, data: &ColumnValues) -> Envelope {
        conclude("create_record", table, self.try_create_record(table, data).await)
    }

    /// Select rows matching all `conditions`; an empty result is a success.
    pub async fn read_records(
        &self,
        table: &str,
        conditions: Option<&ColumnValues>,
        limit: Option<u64>,
    ) -> Envelope {
        conclude(
            "read_records",
            table,
            self.try_read_records(table, conditions, limit).await,
        )
    }

    pub async fn update_records(
        &self,
        table: &str,
        data: &ColumnValues,
        conditions: &ColumnValues,
    ) -> Envelope {
        conclude(
            "update_records",
            table,
            self.try_update_records(table, data, conditions).await,
        )
    }

    pub async fn delete_records(&self, table: &str, conditions: &ColumnValues) -> Envelope {
        conclude(
            "delete_records",
            table,
            self.try_delete_records(table, conditions).await,
        )
    }

    pub async fn list_tables(&self) -> Envelope {
        conclude("list_tables", "", self.try_list_tables().await)
    }

    pub async fn describe_table(&self, table: &str) -> Envelope {
        conclude("describe_table", table, self.try_describe_table(table).await)
    }

    /// Most recent `value_column` by descending `order_column`; `null` when
    /// the table is empty.
    pub async fn latest_value(
        &self,
        table: &str,
        value_column: &str,
        order_column: &str,
    ) -> Envelope {
        conclude(
            "latest_value",
            table,
            self.try_latest_value(table, value_column, order_column)
                .await,
        )
    }

    async fn try_create_record(&self, table: &str, data: &ColumnValues) -> DbResult<Envelope> {
        let fragment = self.builder.insert(table, data)?;
        let id = with_connection!(self, "create_record", fragment, |conn| conn
            .fetch_scalar(&fragment.sql, &fragment.params))?;

        info!(table = %table, columns = data.len(), "Record created");
        Ok(Envelope::Inserted { id })
    }

    async fn try_read_records(
        &self,
        table: &str,
        conditions: Option<&ColumnValues>,
        limit: Option<u64>,
    ) -> DbResult<Envelope> {
        let fragment = self.builder.select(table, conditions, limit)?;
        let rows = with_connection!(self, "read_records", fragment, |conn| conn
            .fetch(&fragment.sql, &fragment.params))?;

        info!(table = %table, rows = rows.len(), "Records read");
        Ok(Envelope::Rows(rows))
    }

    async fn try_update_records(
        &self,
        table: &str,
        data: &ColumnValues,
        conditions: &ColumnValues,
    ) -> DbResult<Envelope> {
        let fragment = self.builder.update(table, data, conditions)?;
        let status = with_connection!(self, "update_records", fragment, |conn| conn
            .execute(&fragment.sql, &fragment.params))?;

        info!(table = %table, status = %status, "Records updated");
        Ok(Envelope::Status(status))
    }

    async fn try_delete_records(
        &self,
        table: &str,
        conditions: &ColumnValues,
    ) -> DbResult<Envelope> {
        let fragment = self.builder.delete(table, conditions)?;
        let status = with_connection!(self, "delete_records", fragment, |conn| conn
            .execute(&fragment.sql, &fragment.params))?;

        info!(table = %table, status = %status, "Records deleted");
        Ok(Envelope::Status(status))
    }

    async fn try_list_tables(&self) -> DbResult<Envelope> {
        let fragment = self.builder.list_tables();
        let rows = with_connection!(self, "list_tables", fragment, |conn| conn
            .fetch(&fragment.sql, &fragment.params))?;

        let tables: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get("table_name").and_then(JsonValue::as_str))
            .map(str::to_string)
            .collect();

        info!(count = tables.len(), "Listed tables");
        Ok(Envelope::Tables(tables))
    }

    async fn try_describe_table(&self, table: &str) -> DbResult<Envelope> {
        let fragment = self.builder.describe_table(table)?;
        let rows = with_connection!(self, "describe_table", fragment, |conn| conn
            .fetch(&fragment.sql, &fragment.params))?;

        let columns = rows
            .into_iter()
            .map(|row| {
                serde_json::from_value::<ColumnDescriptor>(JsonValue::Object(row)).map_err(|e| {
                    DbError::internal(format!("Unexpected column descriptor shape: {}", e))
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        info!(table = %table, columns = columns.len(), "Described table");
        Ok(Envelope::Columns {
            table: table.to_string(),
            columns,
        })
    }

    async fn try_latest_value(
        &self,
        table: &str,
        value_column: &str,
        order_column: &str,
    ) -> DbResult<Envelope> {
        let fragment = self
            .builder
            .latest_value(table, value_column, order_column)?;
        let row = with_connection!(self, "latest_value", fragment, |conn| conn
            .fetch_one(&fragment.sql, &fragment.params))?;

        let value = row.map(|row| row.get(value_column).cloned().unwrap_or(JsonValue::Null));

        info!(table = %table, found = value.is_some(), "Latest value fetched");
        Ok(Envelope::Latest {
            column: value_column.to_string(),
            value,
        })
    }
}

/// Fold an operation result into its envelope, logging failures.
fn conclude(operation: &'static str, table: &str, result: DbResult<Envelope>) -> Envelope {
    match result {
        Ok(envelope) => envelope,
        Err(err) => {
            match err.kind() {
                ErrorKind::InvalidArgument => {
                    warn!(operation, table = %table, error = %err, "Rejected request")
                }
                _ => error!(operation, table = %table, error = %err, "Operation failed"),
            }
            Envelope::from(err)
        }
    }
}
