//! Anthropic-native adapter.
//!
//! Implements the non-streaming Messages API with tool use. System messages
//! go in the separate top-level `system` field and tool results travel as
//! user messages carrying `tool_result` blocks.

use std::time::Duration;

use cs_domain::config::LlmConfig;
use cs_domain::error::{Error, Result};
use cs_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;

use crate::traits::{ChatRequest, ChatResponse, LlmProvider, TokenUsage};
use crate::util::{from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_ID: &str = "anthropic";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Build the adapter from config. Fails with [`Error::Auth`] when the
    /// configured API key variable is unset.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            default_max_tokens: cfg.max_output_tokens,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User => api_messages.push(text_msg_to_anthropic("user", msg)),
                Role::Assistant => api_messages.push(assistant_msg_to_anthropic(msg)),
                Role::Tool => api_messages.push(tool_result_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "max_tokens": req.max_tokens.unwrap_or(self.default_max_tokens),
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.iter().map(tool_to_anthropic).collect());
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req);

        tracing::debug!(model = %self.model, tools = req.tools.len(), "anthropic chat request");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: PROVIDER_ID.into(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_anthropic_response(&resp_json)
    }

    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn text_msg_to_anthropic(role: &str, msg: &Message) -> Value {
    serde_json::json!({
        "role": role,
        "content": msg.content.extract_all_text(),
    })
}

fn assistant_msg_to_anthropic(msg: &Message) -> Value {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Text(t) => vec![serde_json::json!({"type": "text", "text": t})],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(serde_json::json!({
                    "type": "text",
                    "text": text,
                })),
                ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                    "type": "tool_use",
                    "id": id,
                    "name": name,
                    "input": input,
                })),
                ContentPart::ToolResult { .. } => None,
            })
            .collect(),
    };
    serde_json::json!({
        "role": "assistant",
        "content": content,
    })
}

fn tool_result_to_anthropic(msg: &Message) -> Value {
    let content: Vec<Value> = match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                })),
                _ => None,
            })
            .collect(),
        MessageContent::Text(t) => vec![serde_json::json!({"type": "text", "text": t})],
    };
    serde_json::json!({
        "role": "user",
        "content": content,
    })
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_anthropic_response(body: &Value) -> Result<ChatResponse> {
    let blocks = body
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Provider {
            provider: PROVIDER_ID.into(),
            message: "response has no content array".into(),
        })?;

    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in blocks {
        match block.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t);
                }
            }
            "tool_use" => {
                let field = |name: &str| {
                    block
                        .get(name)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string()
                };
                tool_calls.push(ToolCall {
                    call_id: field("id"),
                    tool_name: field("name"),
                    arguments: block
                        .get("input")
                        .cloned()
                        .unwrap_or(Value::Object(Default::default())),
                });
            }
            _ => {}
        }
    }

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(|s| match s {
            "end_turn" => "stop".to_string(),
            "tool_use" => "tool_calls".to_string(),
            other => other.to_string(),
        });

    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse {
        content: text_parts.join(""),
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<TokenUsage> {
    Some(TokenUsage {
        input_tokens: v.get("input_tokens")?.as_u64()?,
        output_tokens: v.get("output_tokens")?.as_u64()?,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
