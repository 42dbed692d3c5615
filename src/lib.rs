//! pg-crud-mcp library
//!
//! Parameterized create/read/update/delete over PostgreSQL tables, exposed as
//! named tools over MCP and a REST endpoint.
//!
//! Layers, bottom-up: `db::builder` turns structured arguments into SQL with
//! bound parameters; `db::postgres` runs it; `engine` owns the per-operation
//! connection lifecycle and shapes results into an `Envelope`; `tools` maps
//! tool names to engine operations; `mcp` and `transport` are the front doors.

pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use engine::CrudEngine;
pub use error::{DbError, DbResult, ErrorKind};
pub use mcp::CrudService;
pub use models::Envelope;
pub use tools::ToolRegistry;
