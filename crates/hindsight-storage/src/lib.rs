//! # hindsight-storage
//!
//! SQLite persistence layer for the hindsight mirror store.
//! Single serialized write connection + read pool (WAL mode),
//! forward-only schema migrations, and the generic lifeline /
//! metadata / scan / cleanup query modules the `StoreEngine`
//! facade is built from.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;
pub mod schema;

pub use connection::DatabaseManager;
pub use engine::StoreEngine;
