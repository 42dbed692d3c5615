//! Data models for the PostgreSQL CRUD server.

pub mod envelope;
pub mod schema;
pub mod value;

pub use envelope::{Envelope, Row};
pub use schema::ColumnDescriptor;
pub use value::{ColumnValues, SqlValue};
