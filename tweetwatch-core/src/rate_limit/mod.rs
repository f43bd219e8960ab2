//! Upstream API rate limiting
//!
//! A single [`RateLimiter`] is shared by every rate-limited function. It
//! counts requests in fixed 15-minute windows whose ceiling comes from the
//! configured [`Tier`].

mod limiter;
mod tier;

pub use limiter::{ConsumeOutcome, RateLimitStatus, RateLimiter};
pub use tier::{Tier, TierLimits, UnknownTier, WINDOW_MINUTES};
