//! `POST /chat`: answer one message through the request gate.

use axum::extract::State;
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cs_domain::chat::ChatMessage;

use super::caller::Caller;
use super::error::ApiError;
use crate::runtime::GateRequest;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Generated as `conv-<12 hex>` when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

pub fn new_conversation_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("conv-{}", &hex[..12])
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    // A bad credential is rejected before anything about the body is judged.
    state.gate.identify(caller.authorization(), &caller.origin)?;

    if body.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".into()));
    }

    let Some(pipeline) = state.pipeline.clone() else {
        return Err(ApiError::Unavailable(format!(
            "No LLM provider is available. Set {} and restart the server.",
            state.config.llm.api_key_env
        )));
    };

    let conversation_id = body
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_conversation_id);
    let history = body.history.unwrap_or_default();

    tracing::info!(
        conversation_id = %conversation_id,
        origin = %caller.origin,
        history_len = history.len(),
        "chat request"
    );

    let output = state
        .gate
        .handle(
            GateRequest {
                authorization: caller.authorization(),
                origin: &caller.origin,
                conversation_id: &conversation_id,
                question: &body.message,
                history: &history,
            },
            pipeline.as_ref(),
            state.database.clone(),
        )
        .await?;

    Ok(Json(ChatResponse {
        message: output.message,
        conversation_id,
        timestamp: Utc::now(),
        metadata: output.metadata,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_expected_shape() {
        let id = new_conversation_id();
        assert!(id.starts_with("conv-"));
        assert_eq!(id.len(), 17);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_conversation_id());
    }
}
