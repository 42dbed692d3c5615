//! MCP server integration module.
//!
//! Exposes the tool registry over the MCP protocol using the rmcp framework.

pub mod service;

pub use service::CrudService;
