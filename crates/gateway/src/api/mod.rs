pub mod caller;
pub mod chat;
pub mod conversations;
pub mod error;
pub mod health;
pub mod usage;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `GET /` stays at the root; everything else lives under `api_prefix`
/// (default `/api/v1`).
pub fn router(api_prefix: &str) -> Router<AppState> {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/chat", post(chat::chat))
        .route("/usage", get(usage::usage))
        .route(
            "/conversations/:id/usage",
            get(conversations::conversation_usage),
        );

    let root = Router::new().route("/", get(health::root));

    let prefix = api_prefix.trim_end_matches('/');
    if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(prefix, api)
    }
}
