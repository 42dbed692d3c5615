//! Database layer.
//!
//! - SQL construction (`builder`, `ident`)
//! - Connectivity traits and the sqlx implementation (`connection`, `postgres`)
//! - Value binding and row decoding (`params`, `types`)

pub mod builder;
pub mod connection;
pub mod ident;
pub mod params;
pub mod postgres;
pub mod types;

pub use builder::{QueryBuilder, SqlFragment};
pub use connection::{Connection, Connector};
pub use ident::Identifier;
pub use postgres::{ConnectParams, PgConn, PgConnector};
