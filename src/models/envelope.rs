//! The uniform result envelope returned by every engine operation.

use crate::error::{DbError, ErrorKind};
use crate::models::ColumnDescriptor;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// A result row: column name → value, in result-set column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Tagged success/failure record.
///
/// Serializes as a flat JSON object with a `success` flag and exactly one
/// payload field, e.g. `{"success": true, "inserted_id": 7}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Inserted { id: JsonValue },
    Rows(Vec<Row>),
    /// Command status reported by the driver, e.g. `UPDATE 3`.
    Status(String),
    Tables(Vec<String>),
    Columns {
        table: String,
        columns: Vec<ColumnDescriptor>,
    },
    /// Latest-value lookup; `value` is `None` when the table is empty.
    Latest {
        column: String,
        value: Option<JsonValue>,
    },
    Failure { kind: ErrorKind, message: String },
}

impl Envelope {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Pretty-printed JSON, as handed to tool-call clients.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| serialization_failure(&e.to_string()))
    }
}

/// Failure body used when an envelope cannot be serialized.
fn serialization_failure(reason: &str) -> String {
    serde_json::json!({
        "success": false,
        "error": format!("Failed to serialize result: {}", reason),
    })
    .to_string()
}

impl From<DbError> for Envelope {
    fn from(err: DbError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &self.is_success())?;
        match self {
            Self::Inserted { id } => map.serialize_entry("inserted_id", id)?,
            Self::Rows(rows) => map.serialize_entry("data", rows)?,
            Self::Status(message) => map.serialize_entry("message", message)?,
            Self::Tables(tables) => map.serialize_entry("tables", tables)?,
            Self::Columns { table, columns } => {
                map.serialize_entry("table", table)?;
                map.serialize_entry("columns", columns)?;
            }
            Self::Latest { column, value } => map.serialize_entry(column, value)?,
            Self::Failure { message, .. } => map.serialize_entry("error", message)?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inserted_serialization() {
        let envelope = Envelope::Inserted { id: json!(42) };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "inserted_id": 42})
        );
    }

    #[test]
    fn test_empty_rows_is_success() {
        let envelope = Envelope::Rows(Vec::new());
        assert!(envelope.is_success());
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "data": []})
        );
    }

    #[test]
    fn test_latest_uses_column_as_key() {
        let envelope = Envelope::Latest {
            column: "base_site".to_string(),
            value: None,
        };
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": true, "base_site": null})
        );
    }

    #[test]
    fn test_columns_serialization() {
        let envelope = Envelope::Columns {
            table: "users".to_string(),
            columns: vec![ColumnDescriptor {
                column_name: "id".to_string(),
                data_type: "integer".to_string(),
                is_nullable: "NO".to_string(),
                column_default: Some("nextval('users_id_seq'::regclass)".to_string()),
            }],
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["table"], "users");
        assert_eq!(value["columns"][0]["column_name"], "id");
        assert_eq!(value["columns"][0]["is_nullable"], "NO");
    }

    #[test]
    fn test_failure_from_error_keeps_kind_but_not_on_wire() {
        let envelope = Envelope::from(DbError::invalid_argument("'conditions' must not be empty"));
        assert!(!envelope.is_success());
        assert_eq!(envelope.error_kind(), Some(ErrorKind::InvalidArgument));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(
            value["error"],
            "Invalid argument: 'conditions' must not be empty"
        );
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_pretty_json_is_parseable() {
        let envelope = Envelope::Status("DELETE 2".to_string());
        let text = envelope.to_pretty_json();
        assert!(text.contains('\n'));
        let parsed: JsonValue = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["message"], "DELETE 2");
    }

    #[test]
    fn test_serialization_failure_escapes_reason() {
        let reason = "key must be a string at line 1 \"col\"\n\\";
        let parsed: JsonValue = serde_json::from_str(&serialization_failure(reason)).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(
            parsed["error"],
            format!("Failed to serialize result: {}", reason)
        );
    }
}
