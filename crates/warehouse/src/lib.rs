//! Local analytical database backing the query agent.

pub mod sqlite;

pub use sqlite::SqliteWarehouse;
