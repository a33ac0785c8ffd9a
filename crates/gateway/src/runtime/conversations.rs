//! Conversation governor: one usage tracker per active conversation id.
//!
//! The map lock is held only to look up or insert a tracker. Accumulation
//! and ceiling checks lock the individual tracker, never the whole map, and
//! nothing here is held across pipeline I/O.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use cs_domain::config::ConversationCeilings;
use cs_domain::usage::{ConversationLimitExceeded, ConversationTracker, UsageSample, UsageSnapshot};

pub struct ConversationGovernor {
    ceilings: ConversationCeilings,
    trackers: RwLock<HashMap<String, Arc<ConversationTracker>>>,
}

impl ConversationGovernor {
    pub fn new(ceilings: ConversationCeilings) -> Self {
        Self {
            ceilings,
            trackers: RwLock::new(HashMap::new()),
        }
    }

    pub fn ceilings(&self) -> &ConversationCeilings {
        &self.ceilings
    }

    /// Existing tracker for `id`, or a fresh zeroed one. Concurrent callers
    /// for the same new id always get the same tracker.
    pub fn get_or_create(&self, id: &str) -> Arc<ConversationTracker> {
        if let Some(tracker) = self.trackers.read().get(id) {
            tracker.touch();
            return tracker.clone();
        }

        let mut trackers = self.trackers.write();
        let tracker = trackers
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(conversation_id = id, "conversation tracker created");
                Arc::new(ConversationTracker::new(id, self.ceilings))
            })
            .clone();
        tracker.touch();
        tracker
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConversationTracker>> {
        self.trackers.read().get(id).cloned()
    }

    /// Unknown conversations have used nothing and pass.
    pub fn check(&self, id: &str) -> Result<(), ConversationLimitExceeded> {
        match self.get(id) {
            Some(tracker) => tracker.check(),
            None => Ok(()),
        }
    }

    pub fn record(&self, id: &str, sample: UsageSample) {
        self.get_or_create(id).record(sample);
    }

    pub fn snapshot(&self, id: &str) -> Option<UsageSnapshot> {
        self.get(id).map(|t| t.snapshot())
    }

    pub fn len(&self) -> usize {
        self.trackers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.read().is_empty()
    }

    /// Drop trackers idle for at least `idle` that no request holds.
    pub fn evict_idle(&self, idle: Duration, now: Instant) -> usize {
        let mut trackers = self.trackers.write();
        let before = trackers.len();
        trackers.retain(|_, t| Arc::strong_count(t) > 1 || t.idle_for(now) < idle);
        before - trackers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_domain::usage::LimitKind;

    fn governor() -> ConversationGovernor {
        ConversationGovernor::new(ConversationCeilings {
            max_requests: 10,
            max_tokens: 50_000,
            max_tool_calls: 15,
        })
    }

    #[test]
    fn three_heavy_calls_breach_token_ceiling() {
        let gov = governor();
        for _ in 0..2 {
            gov.record("conv-1", UsageSample::new(2, 20_000, 1));
            assert!(gov.check("conv-1").is_ok());
        }
        gov.record("conv-1", UsageSample::new(2, 20_000, 1));
        let err = gov.check("conv-1").unwrap_err();
        assert_eq!(err.kind, LimitKind::Tokens);
        assert_eq!(err.used, 60_000);
        assert_eq!(err.limit, 50_000);
    }

    #[test]
    fn unknown_conversation_passes() {
        let gov = governor();
        assert!(gov.check("nope").is_ok());
        assert!(gov.snapshot("nope").is_none());
        assert!(gov.is_empty());
    }

    #[test]
    fn conversations_are_isolated() {
        let gov = governor();
        gov.record("a", UsageSample::new(10, 0, 0));
        assert!(gov.check("a").is_err());
        assert!(gov.check("b").is_ok());
        assert_eq!(gov.snapshot("a").unwrap().requests.remaining, 0);
    }

    #[test]
    fn concurrent_creation_yields_one_tracker() {
        let gov = Arc::new(governor());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gov = gov.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        gov.get_or_create("conv-race").record(UsageSample::new(0, 1, 0));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(gov.len(), 1);
        assert_eq!(gov.get("conv-race").unwrap().usage().total_tokens, 800);
    }

    #[test]
    fn eviction_skips_busy_and_recent_trackers() {
        let gov = governor();
        gov.get_or_create("idle");
        let held = gov.get_or_create("busy");
        let now = Instant::now() + Duration::from_secs(100);

        let evicted = gov.evict_idle(Duration::from_secs(50), now);
        assert_eq!(evicted, 1);
        assert!(gov.get("idle").is_none());
        assert!(gov.get("busy").is_some());
        drop(held);

        gov.get_or_create("fresh");
        assert_eq!(gov.evict_idle(Duration::from_secs(50), Instant::now()), 0);
    }
}
