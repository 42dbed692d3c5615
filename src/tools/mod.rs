//! Tool catalog shared by the MCP and HTTP front doors.
//!
//! - `inputs`: typed arguments and their JSON Schemas
//! - `registry`: tool descriptors and name → operation dispatch

pub mod inputs;
pub mod registry;

pub use inputs::{
    CreateRecordInput, DeleteRecordsInput, DescribeTableInput, LatestValueInput, ListTablesInput,
    ReadRecordsInput, UpdateRecordsInput,
};
pub use registry::{JsonObject, ToolDescriptor, ToolKind, ToolRegistry};
