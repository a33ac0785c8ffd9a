use std::sync::Arc;

use serde::Serialize;

use crate::chat::ChatMessage;
use crate::database::DatabaseHandle;
use crate::error::Result;
use crate::usage::ConversationTracker;

/// Final answer of an agent pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    pub message: String,
    /// SQL queries, chart specs and similar artifacts from specialist agents.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// The LLM-backed pipeline that answers one chat message.
///
/// When a tracker is supplied, implementations must record every agent call's
/// usage into it and stop before starting new agent work once
/// [`ConversationTracker::check`] fails.
#[async_trait::async_trait]
pub trait AgentPipeline: Send + Sync {
    async fn run(
        &self,
        question: &str,
        database: Arc<dyn DatabaseHandle>,
        history: &[ChatMessage],
        tracker: Option<Arc<ConversationTracker>>,
    ) -> Result<PipelineOutput>;
}
