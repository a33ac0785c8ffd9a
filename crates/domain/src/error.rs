use crate::usage::{ConversationLimitExceeded, LimitKind};

/// Shared error type used across all Courtside crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("database: {0}")]
    Database(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    /// A single agent invocation went over its per-role budget.
    #[error("{agent} agent exceeded its {kind} budget: {used}/{limit}")]
    BudgetExceeded {
        agent: String,
        kind: LimitKind,
        used: u64,
        limit: u64,
    },

    /// The cumulative conversation ceilings were reached mid-pipeline.
    #[error(transparent)]
    ConversationLimit(#[from] ConversationLimitExceeded),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
