use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// All usage governance knobs. Loaded once at startup; identical for every
/// conversation and caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub conversation: ConversationCeilings,
    #[serde(default)]
    pub agents: AgentBudgets,
    #[serde(default)]
    pub demo: DemoQuotaConfig,
    #[serde(default)]
    pub eviction: EvictionConfig,
}

/// Cumulative caps for one conversation, across every agent it invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCeilings {
    #[serde(default = "d_10")]
    pub max_requests: u64,
    #[serde(default = "d_150000")]
    pub max_tokens: u64,
    #[serde(default = "d_15")]
    pub max_tool_calls: u64,
}

impl Default for ConversationCeilings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            max_tokens: 150_000,
            max_tool_calls: 15,
        }
    }
}

/// Ceiling for a single invocation of one agent role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub request_ceiling: u64,
    pub token_ceiling: u64,
}

impl Budget {
    pub const fn new(request_ceiling: u64, token_ceiling: u64) -> Self {
        Self {
            request_ceiling,
            token_ceiling,
        }
    }
}

/// Per-role budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBudgets {
    /// SQL call + chart call + retries + response formatting.
    #[serde(default = "d_router_budget")]
    pub router: Budget,
    /// Schema lookup + query generation + retries.
    #[serde(default = "d_query_budget")]
    pub query: Budget,
    /// Chart decision + tool call + retry. Chart specs are verbose.
    #[serde(default = "d_chart_budget")]
    pub chart: Budget,
}

impl Default for AgentBudgets {
    fn default() -> Self {
        Self {
            router: d_router_budget(),
            query: d_query_budget(),
            chart: d_chart_budget(),
        }
    }
}

/// Sliding-window query quota for anonymous callers, keyed by origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoQuotaConfig {
    #[serde(default = "d_6")]
    pub queries_per_window: u32,
    #[serde(default = "d_3600")]
    pub window_secs: u64,
    /// Advertised to anonymous callers; enforcement is left to the agent budgets.
    #[serde(default = "d_20000")]
    pub tokens_per_query: u64,
}

impl DemoQuotaConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for DemoQuotaConfig {
    fn default() -> Self {
        Self {
            queries_per_window: 6,
            window_secs: 3600,
            tokens_per_query: 20_000,
        }
    }
}

/// Background sweep of idle usage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// How often the sweep runs. `0` disables it.
    #[serde(default = "d_600")]
    pub sweep_interval_secs: u64,
    /// Conversations untouched for this long are forgotten.
    #[serde(default = "d_86400")]
    pub conversation_idle_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 600,
            conversation_idle_secs: 86_400,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_6() -> u32 {
    6
}
fn d_10() -> u64 {
    10
}
fn d_15() -> u64 {
    15
}
fn d_600() -> u64 {
    600
}
fn d_3600() -> u64 {
    3600
}
fn d_20000() -> u64 {
    20_000
}
fn d_86400() -> u64 {
    86_400
}
fn d_150000() -> u64 {
    150_000
}
fn d_router_budget() -> Budget {
    Budget::new(6, 50_000)
}
fn d_query_budget() -> Budget {
    Budget::new(6, 20_000)
}
fn d_chart_budget() -> Budget {
    Budget::new(4, 30_000)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let cfg: LimitsConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.conversation, ConversationCeilings::default());
        assert_eq!(cfg.agents.router, Budget::new(6, 50_000));
        assert_eq!(cfg.agents.query, Budget::new(6, 20_000));
        assert_eq!(cfg.agents.chart, Budget::new(4, 30_000));
        assert_eq!(cfg.demo.queries_per_window, 6);
        assert_eq!(cfg.demo.window(), Duration::from_secs(3600));
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let cfg: LimitsConfig = toml::from_str(
            r#"
            [conversation]
            max_tokens = 50000

            [agents.chart]
            request_ceiling = 2
            token_ceiling = 10000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.conversation.max_tokens, 50_000);
        assert_eq!(cfg.conversation.max_requests, 10);
        assert_eq!(cfg.agents.chart, Budget::new(2, 10_000));
        assert_eq!(cfg.agents.router, Budget::new(6, 50_000));
    }
}
