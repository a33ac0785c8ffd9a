//! Read-only SQL tool for the query agent.
//!
//! Failures are returned as structured JSON instead of errors so the model
//! can read the message and correct its query.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use cs_domain::database::{DatabaseHandle, Row};

/// Statements containing any of these words are refused outright.
const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "INSERT", "UPDATE", "ALTER", "CREATE",
];

static DESTRUCTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b({})\b", DESTRUCTIVE_KEYWORDS.join("|"));
    Regex::new(&pattern).expect("destructive keyword pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    Validation,
    Execution,
}

/// Successful execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub sql_query: String,
    pub rows_returned: usize,
    pub results: Vec<Row>,
    pub columns: Vec<String>,
}

impl QueryResult {
    /// Copy holding at most `max_rows` rows. `rows_returned` keeps the full count.
    pub fn preview(&self, max_rows: usize) -> QueryResult {
        QueryResult {
            sql_query: self.sql_query.clone(),
            rows_returned: self.rows_returned,
            results: self.results.iter().take(max_rows).cloned().collect(),
            columns: self.columns.clone(),
        }
    }
}

/// Refused or failed execution.
#[derive(Debug, Clone, Serialize)]
pub struct QueryError {
    pub sql_query: String,
    pub error_message: String,
    pub error_type: QueryErrorKind,
}

/// Check that `sql` is a single read-only statement.
pub fn validate_select(sql: &str) -> Result<(), QueryError> {
    let trimmed = sql.trim_start();
    let head: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if head != "SELECT" && head != "WITH" {
        return Err(QueryError {
            sql_query: sql.to_string(),
            error_message: "Only SELECT queries are allowed. Query must start with SELECT or WITH."
                .into(),
            error_type: QueryErrorKind::Validation,
        });
    }

    if let Some(m) = DESTRUCTIVE_RE.find(sql) {
        return Err(QueryError {
            sql_query: sql.to_string(),
            error_message: format!(
                "Query contains disallowed operation {}. Allowed: read-only SELECT statements.",
                m.as_str().to_ascii_uppercase()
            ),
            error_type: QueryErrorKind::Validation,
        });
    }

    Ok(())
}

/// Validate then run `sql`.
pub async fn execute_sql_query(
    sql: &str,
    database: &dyn DatabaseHandle,
) -> Result<QueryResult, QueryError> {
    validate_select(sql)?;

    match database.execute(sql).await {
        Ok(results) => {
            let columns = results
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default();
            tracing::debug!(rows = results.len(), "query executed");
            Ok(QueryResult {
                sql_query: sql.to_string(),
                rows_returned: results.len(),
                results,
                columns,
            })
        }
        Err(e) => {
            tracing::debug!(error = %e, "query failed");
            Err(QueryError {
                sql_query: sql.to_string(),
                error_message: e.to_string(),
                error_type: QueryErrorKind::Execution,
            })
        }
    }
}

/// Tool-result JSON for either outcome.
pub fn outcome_json(outcome: &Result<QueryResult, QueryError>) -> Value {
    let (status, body) = match outcome {
        Ok(result) => ("success", serde_json::to_value(result)),
        Err(error) => ("error", serde_json::to_value(error)),
    };
    let mut value = body.unwrap_or_else(|_| Value::Object(Default::default()));
    if let Value::Object(map) = &mut value {
        map.insert("status".into(), Value::String(status.into()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_warehouse::SqliteWarehouse;

    #[test]
    fn accepts_select_and_with() {
        assert!(validate_select("select * from games").is_ok());
        assert!(validate_select("  SELECT 1").is_ok());
        assert!(validate_select("WITH t AS (SELECT 1 AS x) SELECT x FROM t").is_ok());
    }

    #[test]
    fn rejects_non_select() {
        let err = validate_select("PRAGMA table_info(games)").unwrap_err();
        assert_eq!(err.error_type, QueryErrorKind::Validation);
        assert!(validate_select("").is_err());
        assert!(validate_select("SELECTED").is_err());
    }

    #[test]
    fn rejects_destructive_keywords_as_whole_words() {
        let err = validate_select("SELECT 1; DROP TABLE games").unwrap_err();
        assert!(err.error_message.contains("DROP"));
        assert!(validate_select("select * from t; delete from t").is_err());
    }

    #[test]
    fn allows_keywords_inside_identifiers() {
        assert!(validate_select("SELECT created_at, last_update FROM games").is_ok());
        assert!(validate_select("SELECT team_name FROM dropped_players").is_ok());
    }

    #[tokio::test]
    async fn executes_and_reports_columns() {
        let db = SqliteWarehouse::memory().unwrap();
        db.execute_batch(
            "CREATE TABLE standings (team_name TEXT, wins INTEGER);
             INSERT INTO standings VALUES ('Boston Celtics', 64), ('Denver Nuggets', 57);",
        )
        .await
        .unwrap();

        let result = execute_sql_query("SELECT team_name, wins FROM standings ORDER BY wins DESC", &db)
            .await
            .unwrap();
        assert_eq!(result.rows_returned, 2);
        assert_eq!(result.columns, ["team_name", "wins"]);

        let json = outcome_json(&Ok(result));
        assert_eq!(json["status"], "success");
        assert_eq!(json["results"][0]["team_name"], "Boston Celtics");
    }

    #[tokio::test]
    async fn execution_errors_are_structured() {
        let db = SqliteWarehouse::memory().unwrap();
        let outcome = execute_sql_query("SELECT * FROM nowhere", &db).await;
        let json = outcome_json(&outcome);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_type"], "execution");
        assert_eq!(json["sql_query"], "SELECT * FROM nowhere");
    }
}
