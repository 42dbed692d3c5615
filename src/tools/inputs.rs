//! Typed tool arguments.
//!
//! Each struct doubles as the tool's published JSON Schema, so the field docs
//! below are what clients see.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

/// Input for pg_create_record and insert_in_postgres.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateRecordInput {
    /// Table name, optionally schema-qualified (e.g. "users" or "public.users")
    pub table: String,
    /// Column → value mapping for the new row. Must not be empty.
    pub data: Map<String, JsonValue>,
}

/// Input for pg_read_records and get_from_postgres.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadRecordsInput {
    /// Table name
    pub table: String,
    /// Column → value equality filters, combined with AND. Omit to read all rows.
    #[serde(default)]
    pub conditions: Option<Map<String, JsonValue>>,
    /// Maximum number of rows to return
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Input for pg_update_records.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateRecordsInput {
    /// Table name
    pub table: String,
    /// Column → new value mapping. Must not be empty.
    pub data: Map<String, JsonValue>,
    /// Column → value equality filters selecting the rows to update. Must not be empty.
    pub conditions: Map<String, JsonValue>,
}

/// Input for pg_delete_records.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteRecordsInput {
    /// Table name
    pub table: String,
    /// Column → value equality filters selecting the rows to delete. Must not be empty.
    pub conditions: Map<String, JsonValue>,
}

/// Input for pg_list_tables.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListTablesInput {}

/// Input for pg_describe_table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name as stored in the catalog (case-sensitive)
    pub table: String,
}

/// Input for get_base_site.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LatestValueInput {
    /// Table holding `base_site` and `calculated_time` columns
    pub table: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_input_optional_fields() {
        let input: ReadRecordsInput = serde_json::from_value(json!({"table": "users"})).unwrap();
        assert!(input.conditions.is_none());
        assert!(input.limit.is_none());
    }

    #[test]
    fn test_negative_limit_rejected() {
        let result: Result<ReadRecordsInput, _> =
            serde_json::from_value(json!({"table": "users", "limit": -1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_data_keeps_key_order() {
        let input: CreateRecordInput = serde_json::from_value(json!({
            "table": "users",
            "data": {"zeta": 1, "alpha": 2, "mid": 3}
        }))
        .unwrap();
        let keys: Vec<&str> = input.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_required_field() {
        let result: Result<DeleteRecordsInput, _> =
            serde_json::from_value(json!({"table": "users"}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("conditions"), "unexpected error: {}", err);
    }
}
