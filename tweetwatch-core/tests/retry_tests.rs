//! Tests for retrying failed protocol requests

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tweetwatch_core::engine::{AdapterError, FnAdapter, Invocation};
use tweetwatch_core::protocol::{ErrorDescriptor, ErrorKind, Message, ProtocolError, Request};
use tweetwatch_core::registry::FunctionDescriptor;
use tweetwatch_core::retry::{RetryExecutor, RetryPolicy};
use tweetwatch_core::ProtocolEngine;

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        exponential_base: 2.0,
        jitter_factor: 0.0,
        respect_next_reset: false,
        timeout_ms: None,
    }
}

#[test]
fn test_policy_presets() {
    let default_policy = RetryPolicy::default();
    assert_eq!(default_policy.max_retries, 3);
    assert!(!default_policy.respect_next_reset);

    let scheduled = RetryPolicy::scheduled();
    assert!(scheduled.respect_next_reset);
    assert_eq!(scheduled.max_retries, 2);

    assert_eq!(RetryPolicy::no_retry().max_retries, 0);
    assert_eq!(RetryPolicy::new(7).max_retries, 7);
}

#[test]
fn test_rate_limit_delay_follows_next_reset() {
    let now = Utc::now();
    let descriptor = ProtocolError::RateLimitExceeded {
        next_reset: now + ChronoDuration::seconds(120),
    }
    .to_descriptor();

    let waits = RetryPolicy::scheduled().calculate_delay(0, &descriptor, now);
    assert_eq!(waits, Duration::from_secs(120));

    let capped = fast_policy(1).calculate_delay(0, &descriptor, now);
    assert_eq!(capped, Duration::from_millis(5));
}

#[test]
fn test_permanent_errors_are_not_retried() {
    let policy = RetryPolicy::default();
    let descriptor = ErrorDescriptor::new(ErrorKind::ValidationError, "bad");
    assert!(!policy.should_retry(&descriptor, 0));
}

#[tokio::test]
async fn test_retries_flaky_adapter_until_success() {
    let engine = ProtocolEngine::builder().build().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    engine
        .registry()
        .register_tool(
            FunctionDescriptor::new("flaky", "Fails twice"),
            Arc::new(FnAdapter::new(move |_: Invocation| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AdapterError::new("upstream hiccup"))
                    } else {
                        Ok(json!({"ok": true}))
                    }
                }
            })),
        )
        .unwrap();

    let executor = RetryExecutor::new(fast_policy(3));
    let result = executor
        .execute(|| {
            engine.handle(Request::new(
                "retry",
                Message::function_call("flaky", Default::default()),
            ))
        })
        .await;

    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(result.error_history.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(engine.transcript("retry").unwrap().len(), 6);
}

#[tokio::test]
async fn test_gives_up_on_permanent_failure() {
    let engine = ProtocolEngine::builder().build().unwrap();
    engine
        .registry()
        .register_tool(
            FunctionDescriptor::new("broken", "Always fails"),
            Arc::new(FnAdapter::new(|_: Invocation| async {
                Err::<serde_json::Value, _>(AdapterError::permanent("bad credentials"))
            })),
        )
        .unwrap();

    let executor = RetryExecutor::new(fast_policy(5));
    let result = executor
        .execute(|| {
            engine.handle(Request::new(
                "retry",
                Message::function_call("broken", Default::default()),
            ))
        })
        .await;

    assert!(!result.is_success());
    assert_eq!(result.attempts, 0);
    let error = result.response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::AdapterExecutionError);
    assert!(!error.retryable);
}
