//! Descriptors of the monitor's scheduled actions
//!
//! The scheduler binds its own adapters to these descriptors at startup.

use crate::registry::{FunctionDescriptor, ParamType};

pub const COLLECT_TWEETS: &str = "collect_tweets";
pub const GENERATE_REPORT: &str = "generate_report";
pub const CLEANUP: &str = "cleanup";

/// Harvest recent posts matching the configured keywords
pub fn collect_tweets() -> FunctionDescriptor {
    FunctionDescriptor::new(
        COLLECT_TWEETS,
        "Search the upstream API for recent posts matching the monitoring keywords",
    )
    .with_optional_param(
        "max_results",
        ParamType::Integer,
        "Page size, bounded by the tier's per-request maximum",
    )
    .with_optional_param(
        "keywords",
        ParamType::Array,
        "Override the configured search keywords",
    )
    .rate_limited()
}

pub fn generate_report() -> FunctionDescriptor {
    FunctionDescriptor::new(GENERATE_REPORT, "Build the daily incident report")
        .with_optional_param(
            "date",
            ParamType::String,
            "Report date as YYYY-MM-DD, defaults to today",
        )
}

pub fn cleanup() -> FunctionDescriptor {
    FunctionDescriptor::new(CLEANUP, "Delete harvested data older than the retention period")
        .with_optional_param(
            "retention_days",
            ParamType::Integer,
            "Override the configured retention in days",
        )
}

/// Every scheduled action, in registration order
pub fn all() -> Vec<FunctionDescriptor> {
    vec![collect_tweets(), generate_report(), cleanup()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_collection_is_rate_limited() {
        let limited: Vec<_> = all()
            .into_iter()
            .filter(|d| d.rate_limited)
            .map(|d| d.name)
            .collect();
        assert_eq!(limited, vec![COLLECT_TWEETS]);
    }

    #[test]
    fn test_no_required_parameters() {
        for descriptor in all() {
            assert_eq!(descriptor.required_parameters().count(), 0, "{}", descriptor.name);
            assert!(descriptor.check().is_ok());
        }
    }
}
