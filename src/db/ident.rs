//! Identifier validation.
//!
//! Table and column names cannot be bound as parameters, so they are the one
//! place caller input reaches SQL text. Only names that match a strict
//! allow-list pattern are accepted; everything else is rejected before any
//! SQL is built.

use crate::error::{DbError, DbResult};
use std::fmt;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// A validated table or column name, optionally schema-qualified
/// (`schema.table`). Rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(name: &str) -> DbResult<Self> {
        if name.is_empty() {
            return Err(DbError::invalid_argument("identifier must not be empty"));
        }

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 {
            return Err(DbError::invalid_argument(format!(
                "invalid identifier '{}': at most one schema qualifier is allowed",
                name
            )));
        }
        for segment in &segments {
            validate_segment(name, segment)?;
        }

        Ok(Self(name.to_string()))
    }

    /// For compile-time constant names only.
    pub(crate) fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::parse(name).is_ok(), "invalid static identifier");
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_segment(name: &str, segment: &str) -> DbResult<()> {
    let mut chars = segment.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !starts_ok || !rest_ok {
        return Err(DbError::invalid_argument(format!(
            "invalid identifier '{}': names must start with a letter or underscore \
             and contain only letters, digits and underscores",
            name
        )));
    }
    if segment.len() > MAX_IDENTIFIER_LEN {
        return Err(DbError::invalid_argument(format!(
            "invalid identifier '{}': longer than {} bytes",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    Ok(())
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
