//! Storage layer (`SQLite` key-value substrate)

pub mod db;
pub mod kv;
pub mod migrations;

pub use db::Database;
pub use kv::SnapshotStore;
