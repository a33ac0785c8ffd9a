pub mod chart;
pub mod sql;

use cs_domain::error::Result;
use cs_domain::tool::{ToolCall, ToolDefinition, ToolOutcome};

/// The tools one agent role can call.
///
/// `call` returns `Err` only for failures that must abort the whole run
/// (conversation ceilings). Ordinary tool failures are reported to the
/// model as an error outcome.
#[async_trait::async_trait]
pub trait Toolbox: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn call(&self, call: &ToolCall) -> Result<ToolOutcome>;
}

pub(crate) fn json_outcome(call: &ToolCall, value: &serde_json::Value, is_error: bool) -> ToolOutcome {
    ToolOutcome {
        call_id: call.call_id.clone(),
        content: value.to_string(),
        is_error,
    }
}

pub(crate) fn error_outcome(call: &ToolCall, message: impl Into<String>) -> ToolOutcome {
    let value = serde_json::json!({ "status": "error", "error_message": message.into() });
    json_outcome(call, &value, true)
}
