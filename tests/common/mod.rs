//! In-memory connector for exercising the engine without a server.
//!
//! Records every statement it receives and counts connects and closes, so
//! tests can check both the SQL produced and the connection lifecycle.

#![allow(dead_code)]

use pg_crud_mcp::db::{Connection, Connector, QueryBuilder};
use pg_crud_mcp::engine::CrudEngine;
use pg_crud_mcp::error::{DbError, DbResult};
use pg_crud_mcp::models::{Row, SqlValue};
use pg_crud_mcp::tools::ToolRegistry;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

#[derive(Debug, Default)]
struct Ledger {
    connects: usize,
    closes: usize,
    statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
struct Script {
    rows: Vec<Row>,
    scalar: JsonValue,
    status: String,
    connect_error: Option<String>,
    execute_error: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            scalar: JsonValue::Null,
            status: "UPDATE 0".to_string(),
            connect_error: None,
            execute_error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    ledger: Arc<Mutex<Ledger>>,
    script: Arc<Mutex<Script>>,
}

fn to_row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("fake rows must be JSON objects, got {}", other),
    }
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by `fetch` (all) and `fetch_one` (first).
    pub fn with_rows(self, rows: Vec<JsonValue>) -> Self {
        self.script.lock().unwrap().rows = rows.into_iter().map(to_row).collect();
        self
    }

    pub fn with_scalar(self, value: JsonValue) -> Self {
        self.script.lock().unwrap().scalar = value;
        self
    }

    pub fn with_status(self, status: &str) -> Self {
        self.script.lock().unwrap().status = status.to_string();
        self
    }

    pub fn failing_connect(self, message: &str) -> Self {
        self.script.lock().unwrap().connect_error = Some(message.to_string());
        self
    }

    pub fn failing_execute(self, message: &str) -> Self {
        self.script.lock().unwrap().execute_error = Some(message.to_string());
        self
    }

    pub fn connects(&self) -> usize {
        self.ledger.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.ledger.lock().unwrap().closes
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.ledger.lock().unwrap().statements.clone()
    }

    pub fn last_statement(&self) -> Statement {
        self.statements()
            .pop()
            .expect("no statement was executed")
    }
}

impl Connector for FakeConnector {
    type Conn = FakeConn;

    async fn connect(&self) -> DbResult<FakeConn> {
        let connect_error = self.script.lock().unwrap().connect_error.clone();
        if let Some(message) = connect_error {
            return Err(DbError::connection(message, "fake connector refused"));
        }
        self.ledger.lock().unwrap().connects += 1;
        Ok(FakeConn {
            ledger: self.ledger.clone(),
            script: self.script.lock().unwrap().clone(),
        })
    }

    fn strategy(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeConn {
    ledger: Arc<Mutex<Ledger>>,
    script: Script,
}

impl FakeConn {
    fn record(&self, sql: &str, params: &[SqlValue]) -> DbResult<()> {
        self.ledger.lock().unwrap().statements.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        match &self.script.execute_error {
            Some(message) => Err(DbError::database(
                message.clone(),
                Some("42P01".to_string()),
                "fake statement failure",
            )),
            None => Ok(()),
        }
    }
}

impl Connection for FakeConn {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<String> {
        self.record(sql, params)?;
        Ok(self.script.status.clone())
    }

    async fn fetch(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Row>> {
        self.record(sql, params)?;
        Ok(self.script.rows.clone())
    }

    async fn fetch_scalar(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<JsonValue> {
        self.record(sql, params)?;
        Ok(self.script.scalar.clone())
    }

    async fn fetch_one(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Option<Row>> {
        self.record(sql, params)?;
        Ok(self.script.rows.first().cloned())
    }

    async fn close(self) -> DbResult<()> {
        self.ledger.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Engine over `connector` with the default builder; the connector handle
/// stays usable for assertions since clones share the ledger.
pub fn engine(connector: &FakeConnector) -> CrudEngine<FakeConnector> {
    CrudEngine::new(connector.clone(), QueryBuilder::default())
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::standard().unwrap()
}

pub fn object(value: JsonValue) -> serde_json::Map<String, JsonValue> {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
