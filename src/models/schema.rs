//! Schema-related data models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One column of a described table, as reported by
/// `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDescriptor {
    pub column_name: String,
    /// Declared type, e.g. "integer", "character varying"
    pub data_type: String,
    /// "YES" or "NO"
    pub is_nullable: String,
    /// Default expression as text, if any
    pub column_default: Option<String>,
}
