//! Per-invocation budget enforcement.
//!
//! Each agent call gets a fresh [`BudgetMeter`]. The meter refuses to start a
//! request once the role's request ceiling has been used, and fails the
//! invocation as soon as the token total goes over the token ceiling.

use cs_domain::config::Budget;
use cs_domain::error::{Error, Result};
use cs_domain::usage::{LimitKind, UsageSample};

use crate::role::AgentRole;

#[derive(Debug)]
pub struct BudgetMeter {
    role: AgentRole,
    budget: Budget,
    requests: u64,
    tokens: u64,
    tool_calls: u64,
}

impl BudgetMeter {
    pub fn new(role: AgentRole, budget: Budget) -> Self {
        Self {
            role,
            budget,
            requests: 0,
            tokens: 0,
            tool_calls: 0,
        }
    }

    /// Reserve the next LLM request.
    pub fn begin_request(&mut self) -> Result<()> {
        if self.requests >= self.budget.request_ceiling {
            return Err(self.exceeded(
                LimitKind::Requests,
                self.requests + 1,
                self.budget.request_ceiling,
            ));
        }
        self.requests += 1;
        Ok(())
    }

    /// Account for a completed request and return its usage sample.
    pub fn finish_request(&mut self, tokens: u64, tool_calls: u64) -> UsageSample {
        self.tokens = self.tokens.saturating_add(tokens);
        self.tool_calls = self.tool_calls.saturating_add(tool_calls);
        UsageSample::request(tokens, tool_calls)
    }

    pub fn check_tokens(&self) -> Result<()> {
        if self.tokens > self.budget.token_ceiling {
            return Err(self.exceeded(LimitKind::Tokens, self.tokens, self.budget.token_ceiling));
        }
        Ok(())
    }

    pub fn total(&self) -> UsageSample {
        UsageSample::new(self.requests, self.tokens, self.tool_calls)
    }

    fn exceeded(&self, kind: LimitKind, used: u64, limit: u64) -> Error {
        tracing::warn!(agent = %self.role, %kind, used, limit, "agent budget exceeded");
        Error::BudgetExceeded {
            agent: self.role.name().to_string(),
            kind,
            used,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ceiling_allows_exactly_n_requests() {
        let mut meter = BudgetMeter::new(AgentRole::Chart, Budget::new(4, 30_000));
        for _ in 0..4 {
            meter.begin_request().unwrap();
        }
        match meter.begin_request().unwrap_err() {
            Error::BudgetExceeded { agent, kind, used, limit } => {
                assert_eq!(agent, "chart");
                assert_eq!(kind, LimitKind::Requests);
                assert_eq!(used, 5);
                assert_eq!(limit, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn token_ceiling_fails_only_when_exceeded() {
        let mut meter = BudgetMeter::new(AgentRole::Query, Budget::new(6, 20_000));
        meter.begin_request().unwrap();
        let sample = meter.finish_request(20_000, 1);
        assert_eq!(sample, UsageSample::new(1, 20_000, 1));
        assert!(meter.check_tokens().is_ok());

        meter.begin_request().unwrap();
        meter.finish_request(1, 0);
        assert!(matches!(
            meter.check_tokens(),
            Err(Error::BudgetExceeded { kind: LimitKind::Tokens, .. })
        ));
        assert_eq!(meter.total(), UsageSample::new(2, 20_001, 1));
    }
}
