//! AppState construction and background-task spawning extracted from `main.rs`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use cs_agents::AgentTeam;
use cs_domain::config::{Config, ConfigSeverity};
use cs_domain::database::DatabaseHandle;
use cs_domain::pipeline::AgentPipeline;
use cs_providers::AnthropicProvider;
use cs_warehouse::SqliteWarehouse;

use crate::runtime::IdentityClassifier;
use crate::state::AppState;

/// Validate config, open the warehouse, build the agent pipeline and return
/// a fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── Warehouse ────────────────────────────────────────────────────
    let warehouse = SqliteWarehouse::open(&config.database.path)
        .with_context(|| format!("opening {}", config.database.path.display()))?;
    let database: Arc<dyn DatabaseHandle> = Arc::new(warehouse);

    // ── Agent pipeline ───────────────────────────────────────────────
    let pipeline: Option<Arc<dyn AgentPipeline>> = match AnthropicProvider::from_config(&config.llm) {
        Ok(provider) => {
            tracing::info!(model = provider.model(), "LLM provider ready");
            Some(Arc::new(AgentTeam::new(
                Arc::new(provider),
                config.limits.agents,
                config.llm.clone(),
            )))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM provider unavailable; /chat will answer 503");
            None
        }
    };

    // ── Identity ─────────────────────────────────────────────────────
    let identity = IdentityClassifier::from_env(&config.server.admin_token_env);

    tracing::info!(
        max_requests = config.limits.conversation.max_requests,
        max_tokens = config.limits.conversation.max_tokens,
        max_tool_calls = config.limits.conversation.max_tool_calls,
        queries_per_window = config.limits.demo.queries_per_window,
        window_secs = config.limits.demo.window_secs,
        "usage limits loaded"
    );

    Ok(AppState::new(config, identity, pipeline, database))
}

/// Spawn the periodic eviction sweep for idle usage state.
pub fn spawn_background_tasks(state: &AppState) {
    let eviction = state.config.limits.eviction;
    if eviction.sweep_interval_secs == 0 {
        tracing::info!("usage eviction sweep disabled");
        return;
    }

    let quota = state.quota.clone();
    let conversations = state.conversations.clone();
    let idle = Duration::from_secs(eviction.conversation_idle_secs);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(eviction.sweep_interval_secs));
        // The first tick fires immediately; nothing to sweep yet.
        interval.tick().await;
        loop {
            interval.tick().await;
            let now = Instant::now();
            let origins = quota.evict_expired(now);
            let convs = conversations.evict_idle(idle, now);
            if origins > 0 || convs > 0 {
                tracing::debug!(origins, conversations = convs, "evicted idle usage state");
            }
        }
    });
}
