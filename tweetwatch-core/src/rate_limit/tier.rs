//! Upstream API access tiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a rate-limit window in minutes
pub const WINDOW_MINUTES: i64 = 15;

/// Upstream API access tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Basic,
    Pro,
}

/// Fixed limits attached to a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Requests allowed per 15-minute window
    pub requests_per_window: u32,
    /// How far back searches may reach
    pub max_historical_days: u32,
    /// Largest page a single request may ask for
    pub max_tweets_per_request: u32,
}

impl Tier {
    /// All tiers, cheapest first
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Basic, Tier::Pro];

    /// Limits for this tier
    pub fn limits(&self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                requests_per_window: 50,
                max_historical_days: 7,
                max_tweets_per_request: 100,
            },
            Tier::Basic => TierLimits {
                requests_per_window: 150,
                max_historical_days: 30,
                max_tweets_per_request: 100,
            },
            Tier::Pro => TierLimits {
                requests_per_window: 300,
                max_historical_days: 90,
                max_tweets_per_request: 500,
            },
        }
    }

    /// Requests allowed per window
    pub fn ceiling(&self) -> u32 {
        self.limits().requests_per_window
    }

    /// Lowercase name of the tier
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tier name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tier '{0}', expected one of: free, basic, pro")]
pub struct UnknownTier(pub String);

impl FromStr for Tier {
    type Err = UnknownTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            _ => Err(UnknownTier(s.to_string())),
        }
    }
}
