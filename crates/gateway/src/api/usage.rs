//! Usage introspection.
//!
//! - `GET /usage`: the caller's tier and, for anonymous callers, their
//!   windowed quota.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use super::caller::Caller;
use super::error::ApiError;
use crate::runtime::{QuotaUsage, Tier};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub tier: Tier,
    #[serde(flatten)]
    pub quota: Option<QuotaUsage>,
}

pub async fn usage(State(state): State<AppState>, caller: Caller) -> Result<Json<UsageResponse>, ApiError> {
    let identity = state.gate.identify(caller.authorization(), &caller.origin)?;

    let quota = match identity.tier {
        Tier::Trusted => None,
        Tier::Anonymous => Some(state.quota.usage_info(&identity.origin)),
    };

    Ok(Json(UsageResponse {
        tier: identity.tier,
        quota,
    }))
}
