//! Authorization and rate limiting.
//!
//! Both checks run before any state is read or written, so a rejection can never
//! leave a deal or a session half-updated.

use crate::config::{OperatorConfig, RateLimitConfig, WindowStrategy};
use crate::domain::user::{Caller, UserId};
use crate::error::{EscrowError, Result};
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Decides whether a caller holds operator privileges.
pub trait OperatorPolicy: Send + Sync {
    fn is_operator(&self, caller: &Caller) -> bool;
}

/// Fixed allow-list of operator ids and handles.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    user_ids: HashSet<i64>,
    usernames: HashSet<String>,
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

impl AllowList {
    pub fn new(
        user_ids: impl IntoIterator<Item = i64>,
        usernames: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            user_ids: user_ids.into_iter().collect(),
            usernames: usernames
                .into_iter()
                .map(|name| normalize_handle(name.as_ref()))
                .collect(),
        }
    }

    pub fn from_config(config: &OperatorConfig) -> Self {
        Self::new(config.user_ids.iter().copied(), &config.usernames)
    }
}

impl OperatorPolicy for AllowList {
    fn is_operator(&self, caller: &Caller) -> bool {
        self.user_ids.contains(&caller.user_id.0)
            || caller
                .username
                .as_deref()
                .is_some_and(|name| self.usernames.contains(&normalize_handle(name)))
    }
}

/// Counting policy for throttled entry points.
///
/// `now` is passed in so policies stay deterministic under test.
pub trait RateLimiter: Send + Sync {
    /// Records a call and returns how long to wait if the budget is exhausted.
    fn check(&self, user_id: UserId, now: Instant) -> std::result::Result<(), Duration>;
}

/// At most `max_calls` in any trailing window of `window_seconds`.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_calls: usize,
    calls: DashMap<UserId, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_seconds),
            max_calls: config.max_calls as usize,
            calls: DashMap::new(),
        }
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, user_id: UserId, now: Instant) -> std::result::Result<(), Duration> {
        let mut calls = self.calls.entry(user_id).or_default();
        while let Some(oldest) = calls.front() {
            if now.duration_since(*oldest) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        if calls.len() >= self.max_calls {
            let oldest = calls.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }
        calls.push_back(now);
        Ok(())
    }
}

/// At most `max_calls` per consecutive bucket of `window_seconds`, the bucket
/// starting at a user's first call after the previous one expired.
pub struct FixedWindowLimiter {
    window: Duration,
    max_calls: u32,
    buckets: DashMap<UserId, (Instant, u32)>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_seconds),
            max_calls: config.max_calls,
            buckets: DashMap::new(),
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, user_id: UserId, now: Instant) -> std::result::Result<(), Duration> {
        let mut bucket = self.buckets.entry(user_id).or_insert((now, 0));
        let (started, count) = &mut *bucket;
        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }
        if *count >= self.max_calls {
            return Err(self.window.saturating_sub(now.duration_since(*started)));
        }
        *count += 1;
        Ok(())
    }
}

pub fn limiter_from_config(config: RateLimitConfig) -> Arc<dyn RateLimiter> {
    match config.strategy {
        WindowStrategy::Sliding => Arc::new(SlidingWindowLimiter::new(config)),
        WindowStrategy::Fixed => Arc::new(FixedWindowLimiter::new(config)),
    }
}

/// The single entry point the engine consults for privileged or throttled calls.
#[derive(Clone)]
pub struct Gate {
    operators: Arc<dyn OperatorPolicy>,
    limiter: Arc<dyn RateLimiter>,
}

impl Gate {
    pub fn new(operators: Arc<dyn OperatorPolicy>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { operators, limiter }
    }

    pub fn from_config(operators: &OperatorConfig, rate_limit: RateLimitConfig) -> Self {
        Self::new(
            Arc::new(AllowList::from_config(operators)),
            limiter_from_config(rate_limit),
        )
    }

    pub fn require_operator(&self, caller: &Caller, action: &'static str) -> Result<()> {
        if self.operators.is_operator(caller) {
            Ok(())
        } else {
            warn!(user_id = %caller.user_id, action, "operator action denied");
            Err(EscrowError::Unauthorized { action })
        }
    }

    pub fn throttle(&self, caller: &Caller) -> Result<()> {
        self.limiter
            .check(caller.user_id, Instant::now())
            .map_err(|wait| {
                warn!(user_id = %caller.user_id, "rate limit exceeded");
                EscrowError::RateLimited {
                    retry_after_secs: wait.as_secs().max(1),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window_seconds: u64, max_calls: u32, strategy: WindowStrategy) -> RateLimitConfig {
        RateLimitConfig {
            window_seconds,
            max_calls,
            strategy,
        }
    }

    #[test]
    fn test_allow_list_matches_id_or_handle() {
        let list = AllowList::new([42], ["@Darx_Zerox"]);

        assert!(list.is_operator(&Caller::new(42, None, "Root")));
        assert!(list.is_operator(&Caller::new(7, Some("darx_zerox"), "D")));
        assert!(list.is_operator(&Caller::new(7, Some("@DARX_ZEROX"), "D")));
        assert!(!list.is_operator(&Caller::new(7, Some("darx"), "D")));
        assert!(!list.is_operator(&Caller::new(7, None, "D")));
    }

    #[test]
    fn test_require_operator_reports_action() {
        let gate = Gate::new(
            Arc::new(AllowList::new([1], Vec::<String>::new())),
            limiter_from_config(RateLimitConfig::default()),
        );
        assert!(gate.require_operator(&Caller::new(1, None, "op"), "resolve").is_ok());
        assert!(matches!(
            gate.require_operator(&Caller::new(2, None, "user"), "resolve"),
            Err(EscrowError::Unauthorized { action: "resolve" })
        ));
    }

    #[test]
    fn test_sliding_window() {
        let limiter = SlidingWindowLimiter::new(config(10, 2, WindowStrategy::Sliding));
        let user = UserId(1);
        let t0 = Instant::now();

        assert!(limiter.check(user, t0).is_ok());
        assert!(limiter.check(user, t0 + Duration::from_secs(4)).is_ok());
        let wait = limiter.check(user, t0 + Duration::from_secs(5)).unwrap_err();
        assert_eq!(wait, Duration::from_secs(5));

        // The first call ages out, freeing exactly one slot.
        assert!(limiter.check(user, t0 + Duration::from_secs(10)).is_ok());
        assert!(limiter.check(user, t0 + Duration::from_secs(11)).is_err());
    }

    #[test]
    fn test_fixed_window() {
        let limiter = FixedWindowLimiter::new(config(10, 2, WindowStrategy::Fixed));
        let user = UserId(1);
        let t0 = Instant::now();

        assert!(limiter.check(user, t0).is_ok());
        assert!(limiter.check(user, t0 + Duration::from_secs(9)).is_ok());
        assert!(limiter.check(user, t0 + Duration::from_secs(9)).is_err());
        // New bucket: the whole budget is back.
        assert!(limiter.check(user, t0 + Duration::from_secs(10)).is_ok());
        assert!(limiter.check(user, t0 + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn test_limits_are_per_user() {
        let limiter = SlidingWindowLimiter::new(config(60, 1, WindowStrategy::Sliding));
        let now = Instant::now();
        assert!(limiter.check(UserId(1), now).is_ok());
        assert!(limiter.check(UserId(1), now).is_err());
        assert!(limiter.check(UserId(2), now).is_ok());
    }

    #[test]
    fn test_throttle_maps_to_rate_limited() {
        let gate = Gate::from_config(
            &OperatorConfig::default(),
            config(60, 1, WindowStrategy::Fixed),
        );
        let caller = Caller::new(5, None, "u");
        assert!(gate.throttle(&caller).is_ok());
        assert!(matches!(
            gate.throttle(&caller),
            Err(EscrowError::RateLimited { retry_after_secs }) if retry_after_secs >= 1
        ));
    }
}
