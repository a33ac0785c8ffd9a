//! SQLite-backed [`DatabaseHandle`].
//!
//! rusqlite is synchronous, so every call runs on the blocking thread pool
//! and never stalls the request executor.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

use cs_domain::database::{ColumnInfo, DatabaseHandle, Row, SchemaInfo};
use cs_domain::error::{Error, Result};

/// Shared SQLite connection.
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouse {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        tracing::info!(path = %path.display(), "analytics database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, mainly for tests.
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a batch of statements (DDL, seed data).
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_connection(move |conn| conn.execute_batch(&sql).map_err(db_err))
            .await
    }

    async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| Error::Other(format!("database task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl DatabaseHandle for SqliteWarehouse {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        self.with_connection(move |conn| query_rows(conn, &sql)).await
    }

    async fn schema_info(&self) -> Result<SchemaInfo> {
        self.with_connection(|conn| {
            let mut tables_stmt = conn
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                     ORDER BY name",
                )
                .map_err(db_err)?;
            let tables: Vec<String> = tables_stmt
                .query_map([], |r| r.get(0))
                .map_err(db_err)?
                .collect::<rusqlite::Result<_>>()
                .map_err(db_err)?;

            let mut schema = SchemaInfo::new();
            for table in tables {
                let mut cols_stmt = conn
                    .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")
                    .map_err(db_err)?;
                let columns = cols_stmt
                    .query_map([&table], |r| {
                        Ok(ColumnInfo {
                            name: r.get(0)?,
                            data_type: r.get(1)?,
                        })
                    })
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?;
                schema.insert(table, columns);
            }
            Ok(schema)
        })
        .await
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn query_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([]).map_err(db_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(db_err)? {
        let mut map = Row::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row.get_ref(i).map_err(db_err)?;
            map.insert(name.clone(), to_json(value));
        }
        out.push(map);
    }
    Ok(out)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> SqliteWarehouse {
        let db = SqliteWarehouse::memory().unwrap();
        db.execute_batch(
            "CREATE TABLE team_per_game_stats (team_name TEXT, games_played INTEGER, points_per_game REAL);
             INSERT INTO team_per_game_stats VALUES ('Boston Celtics', 82, 120.6);
             INSERT INTO team_per_game_stats VALUES ('Denver Nuggets', 82, 114.9);",
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn execute_returns_rows_in_column_order() {
        let db = seeded().await;
        let rows = db
            .execute("SELECT team_name, points_per_game FROM team_per_game_stats ORDER BY points_per_game DESC")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["team_name"], "Boston Celtics");
        assert_eq!(rows[0]["points_per_game"], 120.6);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, ["team_name", "points_per_game"]);
    }

    #[tokio::test]
    async fn schema_info_lists_columns() {
        let db = seeded().await;
        let schema = db.schema_info().await.unwrap();
        let cols = &schema["team_per_game_stats"];
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].name, "team_name");
        assert_eq!(cols[0].data_type, "TEXT");
        assert_eq!(cols[1].data_type, "INTEGER");
    }

    #[tokio::test]
    async fn bad_sql_is_database_error() {
        let db = seeded().await;
        let err = db.execute("SELECT * FROM missing_table").await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/analytics.db");
        let db = SqliteWarehouse::open(&path).unwrap();
        db.execute_batch("CREATE TABLE t (x INTEGER)").await.unwrap();
        assert!(path.exists());
    }
}
