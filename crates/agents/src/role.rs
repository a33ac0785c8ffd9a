use std::fmt;
use std::time::Duration;

use cs_domain::config::{AgentBudgets, Budget, LlmConfig};

use crate::prompts;

/// The three agent roles of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Router,
    Query,
    Chart,
}

impl AgentRole {
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::Router => "router",
            AgentRole::Query => "query",
            AgentRole::Chart => "chart",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Router => prompts::ROUTER_SYSTEM_PROMPT,
            AgentRole::Query => prompts::QUERY_SYSTEM_PROMPT,
            AgentRole::Chart => prompts::CHART_SYSTEM_PROMPT,
        }
    }

    pub fn budget(&self, budgets: &AgentBudgets) -> Budget {
        match self {
            AgentRole::Router => budgets.router,
            AgentRole::Query => budgets.query,
            AgentRole::Chart => budgets.chart,
        }
    }

    pub fn timeout(&self, llm: &LlmConfig) -> Duration {
        match self {
            AgentRole::Router => Duration::from_secs(llm.router_timeout_secs),
            AgentRole::Query | AgentRole::Chart => Duration::from_secs(llm.specialist_timeout_secs),
        }
    }

    /// Chart specs must be reproducible, so the chart agent samples greedily.
    pub fn temperature(&self) -> Option<f32> {
        match self {
            AgentRole::Chart => Some(0.0),
            AgentRole::Router | AgentRole::Query => None,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
