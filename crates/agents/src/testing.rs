//! Scripted provider and an empty toolbox for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use cs_domain::error::{Error, Result};
use cs_domain::tool::{ToolCall, ToolDefinition, ToolOutcome};
use cs_providers::{ChatRequest, ChatResponse, LlmProvider, TokenUsage};

use crate::tools::{error_outcome, Toolbox};

/// Replays canned responses in order and remembers every request.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<ChatResponse>>>,
    seen: Arc<Mutex<Vec<ChatRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<ChatResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            seen: Arc::default(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests_seen(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn request(&self, index: usize) -> ChatRequest {
        self.seen.lock()[index].clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.seen.lock().push(req);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("script exhausted".into()))
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

pub fn reply(text: &str, tokens: u64) -> ChatResponse {
    ChatResponse {
        content: text.to_string(),
        tool_calls: Vec::new(),
        usage: Some(TokenUsage {
            input_tokens: tokens,
            output_tokens: 0,
        }),
        model: "scripted".into(),
        finish_reason: Some("stop".into()),
    }
}

pub fn tool_reply(tool: &str, arguments: serde_json::Value, tokens: u64) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: vec![ToolCall {
            call_id: format!("call-{tool}"),
            tool_name: tool.to_string(),
            arguments,
        }],
        usage: Some(TokenUsage {
            input_tokens: tokens,
            output_tokens: 0,
        }),
        model: "scripted".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

/// A toolbox with no tools.
pub(crate) struct NoTools;

#[async_trait::async_trait]
impl Toolbox for NoTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    async fn call(&self, call: &ToolCall) -> Result<ToolOutcome> {
        Ok(error_outcome(call, format!("unknown tool: {}", call.tool_name)))
    }
}
