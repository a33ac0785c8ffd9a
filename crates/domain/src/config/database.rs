use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Local analytical database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; parent directories are created on startup.
    #[serde(default = "d_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: d_path() }
    }
}

fn d_path() -> PathBuf {
    PathBuf::from("data/analytics.db")
}
