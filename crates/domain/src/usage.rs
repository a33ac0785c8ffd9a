//! Usage accounting for agent conversations.
//!
//! [`UsageSample`] is what one agent call reports back, [`ConversationUsage`]
//! is the running aggregate for a conversation, and [`ConversationTracker`] is
//! the lock-protected handle that agent pipelines accumulate into while a
//! request is in flight.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ConversationCeilings;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Samples
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Resources consumed by one agent call. Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSample {
    #[serde(default)]
    pub requests: u64,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub tool_calls: u64,
}

impl UsageSample {
    pub fn new(requests: u64, tokens: u64, tool_calls: u64) -> Self {
        Self {
            requests,
            tokens,
            tool_calls,
        }
    }

    /// One LLM request that consumed `tokens` and emitted `tool_calls` calls.
    pub fn request(tokens: u64, tool_calls: u64) -> Self {
        Self::new(1, tokens, tool_calls)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Limit kinds & errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which counter a ceiling or budget applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Requests,
    Tokens,
    ToolCalls,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Requests => "request",
            LimitKind::Tokens => "token",
            LimitKind::ToolCalls => "tool call",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a conversation total has reached its ceiling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Conversation {kind} limit exceeded: {used}/{limit}. Please start a new conversation."
)]
pub struct ConversationLimitExceeded {
    pub kind: LimitKind,
    pub used: u64,
    pub limit: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ConversationUsage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cumulative usage of one conversation. Only ever grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversationUsage {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_tool_calls: u64,
}

impl ConversationUsage {
    pub fn accumulate(&mut self, sample: UsageSample) {
        self.total_requests = self.total_requests.saturating_add(sample.requests);
        self.total_tokens = self.total_tokens.saturating_add(sample.tokens);
        self.total_tool_calls = self.total_tool_calls.saturating_add(sample.tool_calls);
    }

    /// Fails on the first total that is at or above its ceiling, checked in
    /// the order requests, tokens, tool calls.
    pub fn check(&self, ceilings: &ConversationCeilings) -> Result<(), ConversationLimitExceeded> {
        let checks = [
            (LimitKind::Requests, self.total_requests, ceilings.max_requests),
            (LimitKind::Tokens, self.total_tokens, ceilings.max_tokens),
            (LimitKind::ToolCalls, self.total_tool_calls, ceilings.max_tool_calls),
        ];

        for (kind, used, limit) in checks {
            if used >= limit {
                return Err(ConversationLimitExceeded { kind, used, limit });
            }
        }
        Ok(())
    }

    pub fn snapshot(&self, ceilings: &ConversationCeilings) -> UsageSnapshot {
        UsageSnapshot {
            requests: ResourceUsage::new(self.total_requests, ceilings.max_requests),
            tokens: ResourceUsage::new(self.total_tokens, ceilings.max_tokens),
            tool_calls: ResourceUsage::new(self.total_tool_calls, ceilings.max_tool_calls),
        }
    }
}

/// Used / limit / remaining for one resource.
///
/// `remaining` is signed: a conversation that overshot its ceiling inside a
/// single agent call reports a negative value, which callers treat as
/// exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceUsage {
    pub used: u64,
    pub limit: u64,
    pub remaining: i64,
}

impl ResourceUsage {
    fn new(used: u64, limit: u64) -> Self {
        let remaining = i64::try_from(limit)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(used).unwrap_or(i64::MAX));
        Self {
            used,
            limit,
            remaining,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub requests: ResourceUsage,
    pub tokens: ResourceUsage,
    pub tool_calls: ResourceUsage,
}

impl UsageSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.requests.is_exhausted() || self.tokens.is_exhausted() || self.tool_calls.is_exhausted()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ConversationTracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct TrackerState {
    usage: ConversationUsage,
    last_touched: Instant,
}

/// Shared usage handle for one conversation.
///
/// The lock is only held for the accumulate/check step itself, never across
/// an LLM or database call.
pub struct ConversationTracker {
    id: String,
    ceilings: ConversationCeilings,
    state: Mutex<TrackerState>,
}

impl ConversationTracker {
    pub fn new(id: impl Into<String>, ceilings: ConversationCeilings) -> Self {
        Self {
            id: id.into(),
            ceilings,
            state: Mutex::new(TrackerState {
                usage: ConversationUsage::default(),
                last_touched: Instant::now(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ceilings(&self) -> &ConversationCeilings {
        &self.ceilings
    }

    /// Add a usage sample to the running totals.
    pub fn record(&self, sample: UsageSample) {
        let totals = {
            let mut state = self.state.lock();
            state.usage.accumulate(sample);
            state.last_touched = Instant::now();
            state.usage
        };
        tracing::debug!(
            conversation_id = %self.id,
            requests = totals.total_requests,
            tokens = totals.total_tokens,
            tool_calls = totals.total_tool_calls,
            "conversation usage recorded"
        );
    }

    pub fn check(&self) -> Result<(), ConversationLimitExceeded> {
        self.state.lock().usage.check(&self.ceilings)
    }

    pub fn usage(&self) -> ConversationUsage {
        self.state.lock().usage
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        self.state.lock().usage.snapshot(&self.ceilings)
    }

    /// Mark the conversation as active without changing its totals.
    pub fn touch(&self) {
        self.state.lock().last_touched = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.lock().last_touched)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn ceilings() -> ConversationCeilings {
        ConversationCeilings::default()
    }

    #[test]
    fn fresh_usage_is_zero() {
        let usage = ConversationUsage::default();
        assert_eq!(usage.total_requests, 0);
        assert_eq!(usage.total_tokens, 0);
        assert_eq!(usage.total_tool_calls, 0);
        assert!(usage.check(&ceilings()).is_ok());
    }

    #[test]
    fn accumulate_sums_fieldwise_in_any_order() {
        let samples = [
            UsageSample::new(1, 5_000, 2),
            UsageSample::new(2, 15_000, 1),
            UsageSample::new(1, 8_000, 3),
        ];

        let mut forward = ConversationUsage::default();
        for s in samples {
            forward.accumulate(s);
        }
        let mut backward = ConversationUsage::default();
        for s in samples.iter().rev() {
            backward.accumulate(*s);
        }

        assert_eq!(forward, backward);
        assert_eq!(forward.total_requests, 4);
        assert_eq!(forward.total_tokens, 28_000);
        assert_eq!(forward.total_tool_calls, 6);
    }

    #[test]
    fn missing_sample_fields_default_to_zero() {
        let sample: UsageSample = serde_json::from_str(r#"{"requests": 2}"#).unwrap();
        assert_eq!(sample, UsageSample::new(2, 0, 0));

        let mut usage = ConversationUsage::default();
        usage.accumulate(sample);
        assert_eq!(usage.total_tokens, 0);
        assert_eq!(usage.total_tool_calls, 0);
    }

    #[test]
    fn request_ceiling_blocks_on_reach_not_exceed() {
        let c = ceilings();

        let mut below = ConversationUsage::default();
        below.accumulate(UsageSample::new(c.max_requests - 1, 1_000, 0));
        assert!(below.check(&c).is_ok());

        let mut at = ConversationUsage::default();
        at.accumulate(UsageSample::new(c.max_requests, 1_000, 0));
        let err = at.check(&c).unwrap_err();
        assert_eq!(err.kind, LimitKind::Requests);
        assert_eq!(err.used, c.max_requests);
        assert_eq!(err.limit, c.max_requests);
        assert!(err.to_string().to_lowercase().contains("request limit exceeded"));
    }

    #[test]
    fn token_ceiling_reported() {
        let c = ceilings();
        let mut usage = ConversationUsage::default();
        usage.accumulate(UsageSample::new(1, c.max_tokens, 0));
        let err = usage.check(&c).unwrap_err();
        assert_eq!(err.kind, LimitKind::Tokens);
        assert!(err.to_string().to_lowercase().contains("token limit exceeded"));
    }

    #[test]
    fn tool_call_ceiling_reported() {
        let c = ceilings();
        let mut usage = ConversationUsage::default();
        usage.accumulate(UsageSample::new(1, 0, c.max_tool_calls));
        let err = usage.check(&c).unwrap_err();
        assert_eq!(err.kind, LimitKind::ToolCalls);
        assert!(err.to_string().to_lowercase().contains("tool call limit exceeded"));
    }

    #[test]
    fn only_first_breach_reported() {
        let c = ceilings();
        let mut usage = ConversationUsage::default();
        usage.accumulate(UsageSample::new(c.max_requests, c.max_tokens, c.max_tool_calls));
        assert_eq!(usage.check(&c).unwrap_err().kind, LimitKind::Requests);

        let mut usage = ConversationUsage::default();
        usage.accumulate(UsageSample::new(0, c.max_tokens, c.max_tool_calls));
        assert_eq!(usage.check(&c).unwrap_err().kind, LimitKind::Tokens);
    }

    #[test]
    fn snapshot_reports_remaining_and_goes_negative() {
        let c = ceilings();
        let mut usage = ConversationUsage::default();
        usage.accumulate(UsageSample::new(3, 45_000, 5));

        let snap = usage.snapshot(&c);
        assert_eq!(snap.requests.used, 3);
        assert_eq!(snap.requests.limit, c.max_requests);
        assert_eq!(snap.requests.remaining, c.max_requests as i64 - 3);
        assert_eq!(snap.tokens.remaining, c.max_tokens as i64 - 45_000);
        assert_eq!(snap.tool_calls.remaining, c.max_tool_calls as i64 - 5);
        assert!(!snap.is_exhausted());

        usage.accumulate(UsageSample::new(0, c.max_tokens, 0));
        let snap = usage.snapshot(&c);
        assert!(snap.tokens.remaining < 0);
        assert!(snap.tokens.is_exhausted());
        assert!(snap.is_exhausted());
    }

    #[test]
    fn tracker_records_and_checks() {
        let tracker = ConversationTracker::new("conv-1", ceilings());
        tracker.record(UsageSample::new(2, 10_000, 3));
        assert_eq!(tracker.usage().total_requests, 2);
        assert!(tracker.check().is_ok());

        tracker.record(UsageSample::new(8, 0, 0));
        assert_eq!(tracker.check().unwrap_err().kind, LimitKind::Requests);
        assert_eq!(tracker.id(), "conv-1");
    }

    #[test]
    fn tracker_concurrent_records_are_not_lost() {
        let tracker = std::sync::Arc::new(ConversationTracker::new("conv-x", ceilings()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        t.record(UsageSample::new(1, 10, 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let usage = tracker.usage();
        assert_eq!(usage.total_requests, 800);
        assert_eq!(usage.total_tokens, 8_000);
        assert_eq!(usage.total_tool_calls, 800);
    }
}
