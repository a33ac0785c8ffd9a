use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One result row: column name → JSON value, in select-list order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Column descriptor returned by [`DatabaseHandle::schema_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Table name → columns.
pub type SchemaInfo = BTreeMap<String, Vec<ColumnInfo>>;

/// The analytical database the agents query.
#[async_trait::async_trait]
pub trait DatabaseHandle: Send + Sync {
    /// Run a statement and return every row.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;

    /// Describe every user table.
    async fn schema_info(&self) -> Result<SchemaInfo>;
}
