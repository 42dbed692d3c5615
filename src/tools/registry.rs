//! The tool catalog and the single name → operation dispatch table.
//!
//! Both front doors (MCP and the REST `/execute` endpoint) resolve tool names
//! here, so a name can never mean different things on different transports.

use crate::db::Connector;
use crate::engine::CrudEngine;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnValues, Envelope, SqlValue};
use crate::tools::inputs::{
    CreateRecordInput, DeleteRecordsInput, DescribeTableInput, LatestValueInput, ListTablesInput,
    ReadRecordsInput, UpdateRecordsInput,
};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub type JsonObject = Map<String, JsonValue>;

/// Column converted from an ISO-8601 string by `insert_in_postgres`.
pub const TIMESTAMP_COLUMN: &str = "calculated_time";
/// Column returned by `get_base_site`.
pub const BASE_SITE_COLUMN: &str = "base_site";

/// The engine operation a tool maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    CreateRecord,
    ReadRecords,
    UpdateRecords,
    DeleteRecords,
    ListTables,
    DescribeTable,
    /// Create, with `calculated_time` bound as a timestamp.
    InsertTimestamped,
    /// Latest `base_site` ordered by `calculated_time`.
    LatestBaseSite,
}

impl ToolKind {
    fn input_schema(self) -> DbResult<Arc<JsonObject>> {
        match self {
            Self::CreateRecord | Self::InsertTimestamped => schema_of::<CreateRecordInput>(),
            Self::ReadRecords => schema_of::<ReadRecordsInput>(),
            Self::UpdateRecords => schema_of::<UpdateRecordsInput>(),
            Self::DeleteRecords => schema_of::<DeleteRecordsInput>(),
            Self::ListTables => schema_of::<ListTablesInput>(),
            Self::DescribeTable => schema_of::<DescribeTableInput>(),
            Self::LatestBaseSite => schema_of::<LatestValueInput>(),
        }
    }
}

fn schema_of<T: JsonSchema>() -> DbResult<Arc<JsonObject>> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(JsonValue::Object(map)) => Ok(Arc::new(map)),
        Ok(other) => Err(DbError::internal(format!(
            "Tool schema is not an object: {}",
            other
        ))),
        Err(e) => Err(DbError::internal(format!(
            "Failed to serialize tool schema: {}",
            e
        ))),
    }
}

/// A published tool: what clients see in `list_tools` and `GET /tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
    #[serde(skip)]
    pub kind: ToolKind,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ToolKind,
    ) -> DbResult<Self> {
        Ok(Self {
            name: name.into(),
            description: description.into(),
            input_schema: kind.input_schema()?,
            kind,
        })
    }

    pub fn to_mcp_tool(&self) -> rmcp::model::Tool {
        rmcp::model::Tool::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// Tool name → descriptor, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names are unique; a second registration is an error.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> DbResult<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(DbError::internal(format!(
                "Tool '{}' is already registered",
                descriptor.name
            )));
        }
        self.index
            .insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// The full PostgreSQL CRUD catalog.
    pub fn standard() -> DbResult<Self> {
        let mut registry = Self::new();
        let catalog = [
            (
                "pg_create_record",
                "Insert one row into a table. Returns the generated primary key as inserted_id.",
                ToolKind::CreateRecord,
            ),
            (
                "pg_read_records",
                "Read rows from a table, optionally filtered by column equality conditions \
                 (ANDed) and limited to a number of rows.",
                ToolKind::ReadRecords,
            ),
            (
                "pg_update_records",
                "Update rows matching all conditions. Both data and conditions must be non-empty. \
                 Returns the command status, e.g. \"UPDATE 3\".",
                ToolKind::UpdateRecords,
            ),
            (
                "pg_delete_records",
                "Delete rows matching all conditions. Conditions must be non-empty. \
                 Returns the command status, e.g. \"DELETE 1\".",
                ToolKind::DeleteRecords,
            ),
            (
                "pg_list_tables",
                "List the tables in the public schema.",
                ToolKind::ListTables,
            ),
            (
                "pg_describe_table",
                "Describe a table's columns: name, data type, nullability and default.",
                ToolKind::DescribeTable,
            ),
            (
                "insert_in_postgres",
                "Insert one row. A calculated_time string in ISO-8601 format is stored as a \
                 timestamp.",
                ToolKind::InsertTimestamped,
            ),
            (
                "get_from_postgres",
                "Read rows from a table (same as pg_read_records).",
                ToolKind::ReadRecords,
            ),
            (
                "get_base_site",
                "Return the most recent base_site value of a table, ordered by calculated_time. \
                 The value is null when the table is empty.",
                ToolKind::LatestBaseSite,
            ),
        ];
        for (name, description, kind) in catalog {
            registry.register(ToolDescriptor::new(name, description, kind)?)?;
        }
        Ok(registry)
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn mcp_tools(&self) -> Vec<rmcp::model::Tool> {
        self.tools.iter().map(ToolDescriptor::to_mcp_tool).collect()
    }

    /// Run a tool by name.
    ///
    /// Only an unknown name is an `Err`; every other failure, including
    /// undecodable arguments, is a failure envelope.
    pub async fn dispatch<C: Connector>(
        &self,
        engine: &CrudEngine<C>,
        name: &str,
        arguments: JsonObject,
    ) -> DbResult<Envelope> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| DbError::unknown_tool(name))?;
        debug!(tool = %name, "Dispatching tool call");

        let envelope = match run(descriptor.kind, engine, arguments).await {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(tool = %name, error = %err, "Rejected tool arguments");
                Envelope::from(err)
            }
        };
        Ok(envelope)
    }
}

fn parse_args<T: DeserializeOwned>(arguments: JsonObject) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(arguments))
        .map_err(|e| DbError::invalid_argument(format!("Invalid arguments: {}", e)))
}

/// Build `ColumnValues` for `insert_in_postgres`: a string `calculated_time`
/// is parsed into a timestamp; every other field passes through unchanged.
pub fn timestamped_values(data: JsonObject) -> DbResult<ColumnValues> {
    let timestamp = match data.get(TIMESTAMP_COLUMN) {
        Some(JsonValue::String(s)) => Some(SqlValue::parse_timestamp(s)?),
        _ => None,
    };
    let mut values = ColumnValues::from(data);
    if let Some(ts) = timestamp {
        values.set(TIMESTAMP_COLUMN, ts);
    }
    Ok(values)
}

async fn run<C: Connector>(
    kind: ToolKind,
    engine: &CrudEngine<C>,
    arguments: JsonObject,
) -> DbResult<Envelope> {
    let envelope = match kind {
        ToolKind::CreateRecord => {
            let input: CreateRecordInput = parse_args(arguments)?;
            engine
                .create_record(&input.table, &ColumnValues::from(input.data))
                .await
        }
        ToolKind::InsertTimestamped => {
            let input: CreateRecordInput = parse_args(arguments)?;
            let values = timestamped_values(input.data)?;
            engine.create_record(&input.table, &values).await
        }
        ToolKind::ReadRecords => {
            let input: ReadRecordsInput = parse_args(arguments)?;
            let conditions = input.conditions.map(ColumnValues::from);
            engine
                .read_records(&input.table, conditions.as_ref(), input.limit)
                .await
        }
        ToolKind::UpdateRecords => {
            let input: UpdateRecordsInput = parse_args(arguments)?;
            engine
                .update_records(
                    &input.table,
                    &ColumnValues::from(input.data),
                    &ColumnValues::from(input.conditions),
                )
                .await
        }
        ToolKind::DeleteRecords => {
            let input: DeleteRecordsInput = parse_args(arguments)?;
            engine
                .delete_records(&input.table, &ColumnValues::from(input.conditions))
                .await
        }
        ToolKind::ListTables => {
            let _: ListTablesInput = parse_args(arguments)?;
            engine.list_tables().await
        }
        ToolKind::DescribeTable => {
            let input: DescribeTableInput = parse_args(arguments)?;
            engine.describe_table(&input.table).await
        }
        ToolKind::LatestBaseSite => {
            let input: LatestValueInput = parse_args(arguments)?;
            engine
                .latest_value(&input.table, BASE_SITE_COLUMN, TIMESTAMP_COLUMN)
                .await
        }
    };
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_catalog() {
        let registry = ToolRegistry::standard().unwrap();
        let names: Vec<&str> = registry
            .descriptors()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "pg_create_record",
                "pg_read_records",
                "pg_update_records",
                "pg_delete_records",
                "pg_list_tables",
                "pg_describe_table",
                "insert_in_postgres",
                "get_from_postgres",
                "get_base_site",
            ]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("a", "first", ToolKind::ListTables).unwrap())
            .unwrap();
        let err = registry
            .register(ToolDescriptor::new("a", "second", ToolKind::ReadRecords).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().description, "first");
    }

    #[test]
    fn test_alias_shares_kind_and_schema() {
        let registry = ToolRegistry::standard().unwrap();
        let read = registry.get("pg_read_records").unwrap();
        let alias = registry.get("get_from_postgres").unwrap();
        assert_eq!(read.kind, alias.kind);
        assert_eq!(read.input_schema, alias.input_schema);
    }

    #[test]
    fn test_schema_lists_required_fields() {
        let registry = ToolRegistry::standard().unwrap();
        let schema = &registry.get("pg_update_records").unwrap().input_schema;
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(JsonValue::as_str)
            .collect();
        assert!(required.contains(&"table"));
        assert!(required.contains(&"data"));
        assert!(required.contains(&"conditions"));
    }

    #[test]
    fn test_descriptor_serialization_hides_kind() {
        let registry = ToolRegistry::standard().unwrap();
        let value = serde_json::to_value(registry.get("pg_list_tables").unwrap()).unwrap();
        assert_eq!(value["name"], "pg_list_tables");
        assert!(value.get("input_schema").is_some());
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_mcp_tool_conversion() {
        let registry = ToolRegistry::standard().unwrap();
        let tools = registry.mcp_tools();
        assert_eq!(tools.len(), 9);
        assert_eq!(tools[0].name, "pg_create_record");
    }

    #[test]
    fn test_timestamped_values_converts_only_calculated_time() {
        let data = json!({
            "base_site": "2024-01-01T00:00:00",
            "calculated_time": "2024-05-06T07:08:09",
            "score": 3
        });
        let JsonValue::Object(data) = data else {
            unreachable!()
        };
        let values = timestamped_values(data).unwrap();
        assert_eq!(values.get("base_site").unwrap().type_name(), "string");
        assert!(matches!(
            values.get("calculated_time"),
            Some(SqlValue::Timestamp(_))
        ));
        assert_eq!(values.get("score"), Some(&SqlValue::Int(3)));
        let columns: Vec<&str> = values.columns().collect();
        assert_eq!(columns, vec!["base_site", "calculated_time", "score"]);
    }

    #[test]
    fn test_timestamped_values_rejects_bad_timestamp() {
        let JsonValue::Object(data) = json!({"calculated_time": "yesterday"}) else {
            unreachable!()
        };
        let err = timestamped_values(data).unwrap_err();
        assert!(err.to_string().contains("Invalid isoformat string"));
    }
}
