//! Sliding-window query quota for anonymous callers, keyed by origin.
//!
//! Admission is a reservation: [`IpQuotaTracker::admit`] counts the
//! in-flight request against the window inside the same critical section as
//! the check and hands back a [`QuotaPermit`]. Committing the permit after a
//! successful pipeline run stamps the query into the window. Dropping it
//! uncommitted (pipeline failure, conversation ceiling, panic) releases the
//! slot, so only successful queries consume quota and two requests racing
//! for the last slot can never both get in.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use cs_domain::config::DemoQuotaConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct QuotaWindow {
    queries: VecDeque<Instant>,
    in_flight: u32,
    first_seen: Instant,
}

impl QuotaWindow {
    fn new(now: Instant) -> Self {
        Self {
            queries: VecDeque::new(),
            in_flight: 0,
            first_seen: now,
        }
    }

    /// Drop timestamps that are `window` old or older.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.queries.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.queries.pop_front();
            } else {
                break;
            }
        }
    }

    fn committed(&self) -> u32 {
        self.queries.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "Demo limit reached: {used}/{limit} queries per {window_minutes} minutes. \
     Please wait or sign in for more access."
)]
pub struct QuotaExceeded {
    pub used: u32,
    pub limit: u32,
    pub window_minutes: u64,
}

/// Quota state reported by `GET /usage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,
    pub tokens_per_query_limit: u64,
    /// Minutes until the oldest query in the window expires.
    pub reset_in_minutes: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IpQuotaTracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct IpQuotaTracker {
    config: DemoQuotaConfig,
    windows: Mutex<HashMap<String, QuotaWindow>>,
}

impl IpQuotaTracker {
    pub fn new(config: DemoQuotaConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DemoQuotaConfig {
        &self.config
    }

    pub fn admit(self: &Arc<Self>, origin: &str) -> Result<QuotaPermit, QuotaExceeded> {
        self.admit_at(origin, Instant::now())
    }

    pub fn admit_at(self: &Arc<Self>, origin: &str, now: Instant) -> Result<QuotaPermit, QuotaExceeded> {
        let limit = self.config.queries_per_window;
        let window_len = self.config.window();

        let mut windows = self.windows.lock();
        let window = windows
            .entry(origin.to_string())
            .or_insert_with(|| QuotaWindow::new(now));
        window.prune(now, window_len);

        let used = window.committed() + window.in_flight;
        if used >= limit {
            tracing::info!(origin, used, limit, "anonymous quota exceeded");
            return Err(QuotaExceeded {
                used,
                limit,
                window_minutes: window_len.as_secs() / 60,
            });
        }
        window.in_flight += 1;

        Ok(QuotaPermit {
            tracker: Arc::clone(self),
            origin: origin.to_string(),
            settled: false,
        })
    }

    pub fn usage_info(&self, origin: &str) -> QuotaUsage {
        self.usage_info_at(origin, Instant::now())
    }

    pub fn usage_info_at(&self, origin: &str, now: Instant) -> QuotaUsage {
        let limit = self.config.queries_per_window;
        let window_len = self.config.window();

        let mut windows = self.windows.lock();
        let (used, oldest) = match windows.get_mut(origin) {
            Some(window) => {
                window.prune(now, window_len);
                (window.committed(), window.queries.front().copied())
            }
            None => (0, None),
        };

        let reset = match oldest {
            Some(t) => window_len.saturating_sub(now.saturating_duration_since(t)),
            None => window_len,
        };

        QuotaUsage {
            used: used.min(limit),
            remaining: limit.saturating_sub(used),
            limit,
            tokens_per_query_limit: self.config.tokens_per_query,
            reset_in_minutes: reset.as_secs().div_ceil(60),
        }
    }

    /// Remove origins with no live queries and nothing in flight.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let window_len = self.config.window();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| {
            w.prune(now, window_len);
            !w.queries.is_empty() || w.in_flight > 0
        });
        before - windows.len()
    }

    pub fn tracked_origins(&self) -> usize {
        self.windows.lock().len()
    }

    /// When the origin was first observed, if it is still tracked.
    pub fn first_seen(&self, origin: &str) -> Option<Instant> {
        self.windows.lock().get(origin).map(|w| w.first_seen)
    }

    fn settle(&self, origin: &str, stamp: Option<Instant>) {
        let mut windows = self.windows.lock();
        let now = stamp.unwrap_or_else(Instant::now);
        let window = windows
            .entry(origin.to_string())
            .or_insert_with(|| QuotaWindow::new(now));
        window.in_flight = window.in_flight.saturating_sub(1);
        if let Some(at) = stamp {
            window.queries.push_back(at);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QuotaPermit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A reserved quota slot. Commit it to record the query; drop it to release.
#[must_use = "dropping a permit releases the reserved slot"]
pub struct QuotaPermit {
    tracker: Arc<IpQuotaTracker>,
    origin: String,
    settled: bool,
}

impl std::fmt::Debug for QuotaPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaPermit")
            .field("origin", &self.origin)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

impl QuotaPermit {
    pub fn commit(self) {
        self.commit_at(Instant::now());
    }

    pub fn commit_at(mut self, at: Instant) {
        self.tracker.settle(&self.origin, Some(at));
        self.settled = true;
        tracing::debug!(origin = %self.origin, "anonymous query recorded");
    }
}

impl Drop for QuotaPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(&self.origin, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(limit: u32) -> Arc<IpQuotaTracker> {
        Arc::new(IpQuotaTracker::new(DemoQuotaConfig {
            queries_per_window: limit,
            window_secs: 3600,
            tokens_per_query: 20_000,
        }))
    }

    #[test]
    fn nth_plus_one_query_is_rejected() {
        let quota = tracker(6);
        let t0 = Instant::now();
        for _ in 0..6 {
            quota.admit_at("1.2.3.4", t0).unwrap().commit_at(t0);
        }
        let err = quota.admit_at("1.2.3.4", t0).unwrap_err();
        assert_eq!(err.used, 6);
        assert_eq!(err.limit, 6);
        assert_eq!(quota.usage_info_at("1.2.3.4", t0).remaining, 0);
    }

    #[test]
    fn window_expiry_readmits() {
        let quota = tracker(6);
        let t0 = Instant::now();
        for _ in 0..6 {
            quota.admit_at("1.2.3.4", t0).unwrap().commit_at(t0);
        }
        let later = t0 + Duration::from_secs(3601);
        quota.admit_at("1.2.3.4", later).unwrap().commit_at(later);
        assert_eq!(quota.usage_info_at("1.2.3.4", later).used, 1);
    }

    #[test]
    fn timestamp_exactly_one_window_old_is_dropped() {
        let quota = tracker(1);
        let t0 = Instant::now();
        quota.admit_at("o", t0).unwrap().commit_at(t0);
        assert!(quota.admit_at("o", t0 + Duration::from_secs(3599)).is_err());
        assert!(quota.admit_at("o", t0 + Duration::from_secs(3600)).is_ok());
    }

    #[test]
    fn dropped_permit_consumes_nothing() {
        let quota = tracker(6);
        let before = quota.usage_info("9.9.9.9");
        for _ in 0..10 {
            let permit = quota.admit("9.9.9.9").unwrap();
            drop(permit);
        }
        assert_eq!(quota.usage_info("9.9.9.9"), before);
    }

    #[test]
    fn in_flight_reservations_count_against_limit() {
        let quota = tracker(2);
        let a = quota.admit("o").unwrap();
        let _b = quota.admit("o").unwrap();
        assert!(quota.admit("o").is_err());
        drop(a);
        assert!(quota.admit("o").is_ok());
    }

    #[test]
    fn origins_are_independent() {
        let quota = tracker(1);
        quota.admit("a").unwrap().commit();
        assert!(quota.admit("a").is_err());
        assert!(quota.admit("b").is_ok());
    }

    #[test]
    fn one_slot_race_admits_exactly_one() {
        let quota = tracker(6);
        for _ in 0..5 {
            quota.admit("1.2.3.4").unwrap().commit();
        }

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let quota = quota.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    match quota.admit("1.2.3.4") {
                        Ok(permit) => {
                            // Hold the slot as a running pipeline would.
                            std::thread::sleep(Duration::from_millis(20));
                            permit.commit();
                            true
                        }
                        Err(_) => false,
                    }
                })
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(quota.usage_info("1.2.3.4").used, 6);
    }

    #[test]
    fn usage_info_for_unknown_origin() {
        let quota = tracker(6);
        let info = quota.usage_info("never-seen");
        assert_eq!(info.used, 0);
        assert_eq!(info.remaining, 6);
        assert_eq!(info.tokens_per_query_limit, 20_000);
        assert_eq!(info.reset_in_minutes, 60);
        assert_eq!(quota.tracked_origins(), 0);
    }

    #[test]
    fn reset_counts_down_from_oldest_query() {
        let quota = tracker(6);
        let t0 = Instant::now();
        quota.admit_at("o", t0).unwrap().commit_at(t0);
        let info = quota.usage_info_at("o", t0 + Duration::from_secs(30 * 60 + 1));
        assert_eq!(info.reset_in_minutes, 30);
    }

    #[test]
    fn eviction_keeps_live_windows() {
        let quota = tracker(6);
        let t0 = Instant::now();
        quota.admit_at("old", t0).unwrap().commit_at(t0);
        let later = t0 + Duration::from_secs(1800);
        quota.admit_at("recent", later).unwrap().commit_at(later);
        let _pending = quota.admit_at("pending", later).unwrap();

        let evicted = quota.evict_expired(t0 + Duration::from_secs(3600));
        assert_eq!(evicted, 1);
        assert!(quota.first_seen("old").is_none());
        assert!(quota.first_seen("recent").is_some());
        assert!(quota.first_seen("pending").is_some());
    }
}
