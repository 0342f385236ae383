//! Sliding-window request limiting.
//!
//! Each limiter keeps, per key, the instants of the requests it admitted within the current window. A request is
//! admitted when fewer than `limit` admissions are younger than `window`. Rejected requests are not recorded, so a
//! client that keeps hammering a closed window does not extend its own lockout.
use std::{
    collections::VecDeque,
    fmt::Display,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{PartnerId, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }
}

/// What a limiter counts requests against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateLimitKey {
    Ip(String),
    Partner(PartnerId),
    Subject(SubjectId),
}

impl Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "ip:{ip}"),
            Self::Partner(id) => write!(f, "partner:{id}"),
            Self::Subject(id) => write!(f, "subject:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// How long until the oldest admission leaves the window. Zero when the request was allowed.
    pub retry_after: Duration,
}

pub struct SlidingWindowLimiter {
    name: &'static str,
    rule: RateLimitRule,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(name: &'static str, rule: RateLimitRule) -> Self {
        Self { name, rule, windows: DashMap::new() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rule(&self) -> RateLimitRule {
        self.rule
    }

    pub fn check(&self, key: &RateLimitKey) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Records a request for `key` at `now` if the window has room for it.
    pub fn check_at(&self, key: &RateLimitKey, now: Instant) -> RateLimitDecision {
        let limit = self.rule.limit;
        let mut window = self.windows.entry(key.to_string()).or_default();
        while window.front().is_some_and(|t| now.saturating_duration_since(*t) >= self.rule.window) {
            window.pop_front();
        }
        let used = u32::try_from(window.len()).unwrap_or(u32::MAX);
        if used < limit {
            window.push_back(now);
            RateLimitDecision { allowed: true, limit, remaining: limit - used - 1, retry_after: Duration::ZERO }
        } else {
            let retry_after = window
                .front()
                .map(|oldest| self.rule.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.rule.window);
            debug!("🚦️ {} limiter rejected {key}. {used}/{limit} in window", self.name);
            RateLimitDecision { allowed: false, limit, remaining: 0, retry_after }
        }
    }

    /// Drops keys whose admissions have all left the window. Returns the number of keys removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.rule.window;
        self.windows.retain(|_, admitted| admitted.back().is_some_and(|t| now.saturating_duration_since(*t) < window));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            trace!("🚦️ {} limiter purged {removed} idle keys", self.name);
        }
        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread};

    use super::*;

    fn ip(addr: &str) -> RateLimitKey {
        RateLimitKey::Ip(addr.to_string())
    }

    #[test]
    fn admits_limit_then_rejects_until_window_elapses() {
        let limiter = SlidingWindowLimiter::new("ip", RateLimitRule::per_second(5));
        let start = Instant::now();
        let key = ip("10.0.0.1");
        for i in 0..5 {
            let d = limiter.check_at(&key, start + Duration::from_millis(i * 10));
            assert!(d.allowed, "request {i}");
            assert_eq!(d.remaining, 4 - i as u32);
        }
        let sixth = limiter.check_at(&key, start + Duration::from_millis(60));
        assert!(!sixth.allowed);
        assert_eq!(sixth.retry_after, Duration::from_millis(940));
        // the first admission leaves the window exactly one window after it was recorded
        assert!(limiter.check_at(&key, start + Duration::from_millis(1000)).allowed);
        assert!(!limiter.check_at(&key, start + Duration::from_millis(1001)).allowed);
        assert!(limiter.check_at(&key, start + Duration::from_millis(1010)).allowed);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new("partner", RateLimitRule::per_second(1));
        let now = Instant::now();
        assert!(limiter.check_at(&RateLimitKey::Partner(PartnerId::new(1)), now).allowed);
        assert!(!limiter.check_at(&RateLimitKey::Partner(PartnerId::new(1)), now).allowed);
        assert!(limiter.check_at(&RateLimitKey::Partner(PartnerId::new(2)), now).allowed);
        assert!(limiter.check_at(&ip("1"), now).allowed);
    }

    #[test]
    fn rejections_do_not_extend_the_window() {
        let limiter = SlidingWindowLimiter::new("ip", RateLimitRule::new(1, Duration::from_millis(100)));
        let start = Instant::now();
        let key = ip("10.0.0.2");
        assert!(limiter.check_at(&key, start).allowed);
        for ms in [10, 50, 90] {
            assert!(!limiter.check_at(&key, start + Duration::from_millis(ms)).allowed);
        }
        assert!(limiter.check_at(&key, start + Duration::from_millis(100)).allowed);
    }

    #[test]
    fn purge_removes_idle_keys() {
        let limiter = SlidingWindowLimiter::new("ip", RateLimitRule::per_second(5));
        let start = Instant::now();
        limiter.check_at(&ip("a"), start);
        limiter.check_at(&ip("b"), start + Duration::from_millis(800));
        assert_eq!(limiter.purge_expired(start + Duration::from_millis(1200)), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_the_limit() {
        let limiter = Arc::new(SlidingWindowLimiter::new("ip", RateLimitRule::new(50, Duration::from_secs(60))));
        let handles = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..20).filter(|_| limiter.check(&ip("shared")).allowed).count())
            })
            .collect::<Vec<_>>();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }

    #[test]
    fn key_display() {
        assert_eq!(ip("127.0.0.1").to_string(), "ip:127.0.0.1");
        assert_eq!(RateLimitKey::Partner(PartnerId::new(42)).to_string(), "partner:42");
    }
}
