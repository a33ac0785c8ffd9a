//! `GET /conversations/:id/usage`: cumulative usage of one conversation.

use axum::extract::{Path, State};
use axum::response::Json;

use super::error::ApiError;
use crate::state::AppState;

pub async fn conversation_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let snapshot = state
        .conversations
        .snapshot(&id)
        .ok_or_else(|| ApiError::NotFound(format!("conversation '{id}' not found")))?;

    Ok(Json(serde_json::json!({
        "conversation_id": id,
        "requests": snapshot.requests,
        "tokens": snapshot.tokens,
        "tool_calls": snapshot.tool_calls,
        "exhausted": snapshot.is_exhausted(),
    })))
}
