//! Local persistence layer for Rack

mod connection;
mod kv;
mod migrations;

pub use connection::Database;
pub use kv::{KeyValueStore, LibSqlKeyValueStore};
