//! Fixed-window quota tracking for the upstream API

use super::tier::{Tier, WINDOW_MINUTES};
use crate::clock::{SharedClock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a [`RateLimiter::try_consume`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeOutcome {
    /// Whether the requested units were granted
    pub accepted: bool,
    /// Units left in the window after this call
    pub remaining: u32,
    /// When the window governing `remaining` resets
    pub next_reset: DateTime<Utc>,
}

/// Read-only view of the limiter exposed to status endpoints and the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub tier: Tier,
    /// Tier that takes effect at the next reset
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pending_tier: Option<Tier>,
    pub remaining_requests: u32,
    pub last_request: Option<DateTime<Utc>>,
    /// `None` while no window is open
    pub next_reset: Option<DateTime<Utc>>,
    pub ceiling_per_window: u32,
    pub max_historical_days: u32,
}

#[derive(Debug)]
struct WindowState {
    tier: Tier,
    pending_tier: Option<Tier>,
    remaining: u32,
    window_start: Option<DateTime<Utc>>,
    last_request: Option<DateTime<Utc>>,
}

impl WindowState {
    fn new(tier: Tier) -> Self {
        Self {
            tier,
            pending_tier: None,
            remaining: tier.ceiling(),
            window_start: None,
            last_request: None,
        }
    }

    fn window() -> Duration {
        Duration::minutes(WINDOW_MINUTES)
    }

    fn next_reset(&self) -> Option<DateTime<Utc>> {
        self.window_start.map(|start| start + Self::window())
    }

    /// Close the window if it has expired, applying any pending tier
    fn roll(&mut self, now: DateTime<Utc>) {
        let Some(reset) = self.next_reset() else {
            return;
        };
        if now < reset {
            return;
        }

        if let Some(tier) = self.pending_tier.take() {
            info!(from = %self.tier, to = %tier, "Applying pending rate limit tier");
            self.tier = tier;
        }
        self.window_start = None;
        self.remaining = self.tier.ceiling();
        info!(
            tier = %self.tier,
            remaining = self.remaining,
            "Rate limit window reset"
        );
    }

    fn open_if_idle(&mut self, now: DateTime<Utc>) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
            self.remaining = self.tier.ceiling();
        }
    }
}

/// Tracks remaining upstream quota in fixed 15-minute windows
///
/// Cloning is cheap; clones share the same counter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<WindowState>>,
    clock: SharedClock,
}

impl RateLimiter {
    /// Create a limiter for `tier` using the system clock
    pub fn new(tier: Tier) -> Self {
        Self::with_clock(tier, Arc::new(SystemClock))
    }

    /// Create a limiter driven by `clock`
    pub fn with_clock(tier: Tier, clock: SharedClock) -> Self {
        Self {
            state: Arc::new(Mutex::new(WindowState::new(tier))),
            clock,
        }
    }

    /// Atomically take `n` units from the current window
    ///
    /// The request is granted whole or not at all. `n == 0` always succeeds
    /// and does not open a window.
    pub fn try_consume(&self, n: u32) -> ConsumeOutcome {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);

        if n == 0 {
            return ConsumeOutcome {
                accepted: true,
                remaining: state.remaining,
                next_reset: state.next_reset().unwrap_or(now + WindowState::window()),
            };
        }

        if n > state.remaining {
            debug!(
                requested = n,
                remaining = state.remaining,
                "Rate limit request rejected"
            );
            return ConsumeOutcome {
                accepted: false,
                remaining: state.remaining,
                next_reset: state.next_reset().unwrap_or(now + WindowState::window()),
            };
        }

        state.open_if_idle(now);
        state.remaining -= n;
        state.last_request = Some(now);

        ConsumeOutcome {
            accepted: true,
            remaining: state.remaining,
            next_reset: state.next_reset().unwrap_or(now + WindowState::window()),
        }
    }

    /// Change the tier
    ///
    /// Applies immediately when no window is open; otherwise the current
    /// window keeps its accounting and the new tier starts at the next reset.
    pub fn configure(&self, tier: Tier) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);

        if state.window_start.is_none() {
            info!(from = %state.tier, to = %tier, "Rate limit tier changed");
            state.tier = tier;
            state.pending_tier = None;
            state.remaining = tier.ceiling();
        } else if tier == state.tier {
            state.pending_tier = None;
        } else {
            info!(
                from = %state.tier,
                to = %tier,
                "Rate limit tier change deferred to next reset"
            );
            state.pending_tier = Some(tier);
        }
    }

    /// Fold in the upstream API's own remaining counter
    ///
    /// Only ever lowers the local counter.
    pub fn observe_upstream(&self, remaining: u32) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);
        state.open_if_idle(now);
        if remaining < state.remaining {
            debug!(
                local = state.remaining,
                upstream = remaining,
                "Lowering remaining quota to upstream value"
            );
            state.remaining = remaining;
        }
    }

    /// Current tier
    pub fn tier(&self) -> Tier {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);
        state.tier
    }

    /// Snapshot of the limiter state
    pub fn status(&self) -> RateLimitStatus {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);

        let limits = state.tier.limits();
        RateLimitStatus {
            tier: state.tier,
            pending_tier: state.pending_tier,
            remaining_requests: state.remaining,
            last_request: state.last_request,
            next_reset: state.next_reset(),
            ceiling_per_window: limits.requests_per_window,
            max_historical_days: limits.max_historical_days,
        }
    }

    /// Whether a scheduled collection should be skipped for now
    pub fn should_skip_collection(&self) -> bool {
        self.should_wait().is_some()
    }

    /// Time until quota is available again, if the window is exhausted
    pub fn should_wait(&self) -> Option<std::time::Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.roll(now);

        if state.remaining > 0 {
            return None;
        }
        state
            .next_reset()
            .map(|reset| (reset - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Tier::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn limiter(tier: Tier) -> (RateLimiter, ManualClock) {
        let clock = ManualClock::starting_now();
        (RateLimiter::with_clock(tier, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_window_opens_lazily() {
        let (limiter, clock) = limiter(Tier::Free);
        assert_eq!(limiter.status().next_reset, None);

        let outcome = limiter.try_consume(1);
        assert!(outcome.accepted);
        assert_eq!(outcome.remaining, 49);
        assert_eq!(outcome.next_reset, clock.now() + Duration::minutes(15));
    }

    #[test]
    fn test_zero_consume_is_free() {
        let (limiter, _) = limiter(Tier::Free);
        let outcome = limiter.try_consume(0);
        assert!(outcome.accepted);
        assert_eq!(outcome.remaining, 50);
        assert!(limiter.status().next_reset.is_none());
    }

    #[test]
    fn test_no_partial_consumption() {
        let (limiter, _) = limiter(Tier::Free);
        assert!(limiter.try_consume(45).accepted);
        let outcome = limiter.try_consume(10);
        assert!(!outcome.accepted);
        assert_eq!(outcome.remaining, 5);
    }

    #[test]
    fn test_resets_exactly_at_boundary() {
        let (limiter, clock) = limiter(Tier::Free);
        assert!(limiter.try_consume(50).accepted);
        assert!(!limiter.try_consume(1).accepted);

        clock.advance(Duration::minutes(15) - Duration::milliseconds(1));
        assert!(!limiter.try_consume(1).accepted);
        assert!(limiter.should_skip_collection());

        clock.advance(Duration::milliseconds(1));
        assert!(!limiter.should_skip_collection());
        let outcome = limiter.try_consume(1);
        assert!(outcome.accepted);
        assert_eq!(outcome.remaining, 49);
    }

    #[test]
    fn test_configure_defers_inside_window() {
        let (limiter, clock) = limiter(Tier::Free);
        limiter.try_consume(50);
        limiter.configure(Tier::Pro);

        let status = limiter.status();
        assert_eq!(status.tier, Tier::Free);
        assert_eq!(status.pending_tier, Some(Tier::Pro));
        assert_eq!(status.remaining_requests, 0);

        clock.advance(Duration::minutes(15));
        let status = limiter.status();
        assert_eq!(status.tier, Tier::Pro);
        assert_eq!(status.pending_tier, None);
        assert_eq!(status.remaining_requests, 300);
    }

    #[test]
    fn test_configure_applies_when_idle() {
        let (limiter, _) = limiter(Tier::Free);
        limiter.configure(Tier::Basic);
        let status = limiter.status();
        assert_eq!(status.tier, Tier::Basic);
        assert_eq!(status.remaining_requests, 150);
        assert_eq!(status.max_historical_days, 30);
    }

    #[test]
    fn test_upstream_only_lowers() {
        let (limiter, _) = limiter(Tier::Free);
        limiter.try_consume(1);
        limiter.observe_upstream(10);
        assert_eq!(limiter.status().remaining_requests, 10);
        limiter.observe_upstream(40);
        assert_eq!(limiter.status().remaining_requests, 10);
    }

    #[test]
    fn test_should_wait_reports_time_to_reset() {
        let (limiter, clock) = limiter(Tier::Free);
        limiter.try_consume(50);
        clock.advance(Duration::minutes(5));
        let wait = limiter.should_wait().unwrap();
        assert_eq!(wait, std::time::Duration::from_secs(600));
    }
}
