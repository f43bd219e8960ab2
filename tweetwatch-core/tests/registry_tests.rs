//! Integration tests for the function registry

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use test_case::test_case;
use tweetwatch_core::engine::{catalog, AdapterError, FnAdapter, Invocation};
use tweetwatch_core::protocol::{Arguments, ErrorKind, ProtocolError, ValidationIssue};
use tweetwatch_core::registry::{FunctionDescriptor, FunctionRegistry, ParamType, RegistryError};

fn args(value: Value) -> Arguments {
    value.as_object().cloned().unwrap_or_default()
}

fn params(entries: &[(&str, ParamType)]) -> BTreeMap<String, ParamType> {
    entries
        .iter()
        .map(|(name, ty)| (name.to_string(), *ty))
        .collect()
}

#[test]
fn test_register_and_resolve() {
    let registry = FunctionRegistry::new();
    registry
        .register(
            "cleanup",
            "Remove old data",
            params(&[("retention_days", ParamType::Integer)]),
            Vec::<String>::new(),
        )
        .unwrap();

    let descriptor = registry.resolve("cleanup").unwrap();
    assert_eq!(descriptor.description, "Remove old data");
    assert!(!descriptor.parameters["retention_days"].required);
}

#[test]
fn test_unknown_function() {
    let registry = FunctionRegistry::new();
    let err = registry.resolve("launch_rockets").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFunction);
    assert!(matches!(err, ProtocolError::UnknownFunction { name } if name == "launch_rockets"));
}

#[test]
fn test_required_must_be_declared() {
    let registry = FunctionRegistry::new();
    let err = registry
        .register("broken", "", params(&[("a", ParamType::String)]), ["b"])
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    assert!(!registry.contains("broken"));
}

#[test]
fn test_empty_name_rejected() {
    let registry = FunctionRegistry::new();
    let err = registry
        .register_descriptor(FunctionDescriptor::new("  ", "blank"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_unregister_missing() {
    let registry = FunctionRegistry::new();
    assert!(matches!(
        registry.unregister("nope"),
        Err(RegistryError::NotFound { .. })
    ));
}

#[test]
fn test_last_registration_wins_and_keeps_adapter_binding() {
    let registry = FunctionRegistry::new();
    let adapter = Arc::new(FnAdapter::new(|_: Invocation| async {
        Ok::<_, AdapterError>(json!({"ok": true}))
    }));
    registry
        .register_tool(catalog::collect_tweets(), adapter)
        .unwrap();
    assert!(registry.resolve_entry(catalog::COLLECT_TWEETS).unwrap().adapter.is_some());

    registry
        .register_descriptor(FunctionDescriptor::new(catalog::COLLECT_TWEETS, "replaced"))
        .unwrap();
    let entry = registry.resolve_entry(catalog::COLLECT_TWEETS).unwrap();
    assert_eq!(entry.descriptor.description, "replaced");
    assert!(entry.adapter.is_none());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_list_is_sorted() {
    let registry = FunctionRegistry::new();
    for descriptor in catalog::all() {
        registry.register_descriptor(descriptor).unwrap();
    }
    let names: Vec<String> = registry.list().iter().map(|d| d.name.clone()).collect();
    assert_eq!(names, vec!["cleanup", "collect_tweets", "generate_report"]);
}

#[test]
fn test_missing_reported_before_unknown_and_type() {
    let registry = FunctionRegistry::new();
    registry
        .register(
            "update_config",
            "",
            params(&[("key", ParamType::String), ("value", ParamType::String)]),
            ["key", "value"],
        )
        .unwrap();

    let err = registry
        .validate_arguments("update_config", &args(json!({"key": 5, "extra": true})))
        .unwrap_err();
    match err {
        ProtocolError::Validation {
            parameter, issue, ..
        } => {
            assert_eq!(parameter, "value");
            assert_eq!(issue, ValidationIssue::MissingParameter);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = registry
        .validate_arguments(
            "update_config",
            &args(json!({"key": 5, "value": "x", "extra": true})),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Validation { ref parameter, issue: ValidationIssue::UnknownParameter, .. }
            if parameter == "extra"
    ));

    let err = registry
        .validate_arguments("update_config", &args(json!({"key": 5, "value": "x"})))
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Validation { ref parameter, issue: ValidationIssue::TypeMismatch { .. }, .. }
            if parameter == "key"
    ));
}

#[test]
fn test_null_required_counts_as_missing() {
    let descriptor = catalog::generate_report().with_param("format", ParamType::String, "");
    let err = descriptor
        .validate_arguments(&args(json!({"format": null})))
        .unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Validation { issue: ValidationIssue::MissingParameter, .. }
    ));
}

#[test]
fn test_null_optional_is_skipped() {
    let descriptor = catalog::collect_tweets();
    assert!(descriptor
        .validate_arguments(&args(json!({"max_results": null})))
        .is_ok());
}

#[test_case(ParamType::String, json!("x"), true ; "string accepts string")]
#[test_case(ParamType::String, json!(1), false ; "string rejects integer")]
#[test_case(ParamType::Integer, json!(7), true ; "integer accepts integer")]
#[test_case(ParamType::Integer, json!(7.5), false ; "integer rejects float")]
#[test_case(ParamType::Number, json!(7), true ; "number accepts integer")]
#[test_case(ParamType::Number, json!(7.5), true ; "number accepts float")]
#[test_case(ParamType::Boolean, json!(false), true ; "boolean accepts bool")]
#[test_case(ParamType::Boolean, json!("false"), false ; "boolean rejects string")]
#[test_case(ParamType::Array, json!(["a"]), true ; "array accepts array")]
#[test_case(ParamType::Array, json!({}), false ; "array rejects object")]
#[test_case(ParamType::Object, json!({"a": 1}), true ; "object accepts object")]
#[test_case(ParamType::Object, json!(null), false ; "object rejects null")]
fn test_type_conformance(ty: ParamType, value: Value, ok: bool) {
    let descriptor = FunctionDescriptor::new("probe", "").with_param("p", ty, "");
    let result = descriptor.validate_arguments(&args(json!({ "p": value })));
    assert_eq!(result.is_ok(), ok);
}

#[test]
fn test_concurrent_registration_and_lookup() {
    let registry = Arc::new(FunctionRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let name = format!("fn_{}", i % 4);
                for _ in 0..50 {
                    registry
                        .register_descriptor(FunctionDescriptor::new(name.as_str(), format!("v{i}")))
                        .unwrap();
                    assert!(registry.resolve(&name).is_ok());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(registry.len(), 4);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn last_write_wins(descriptions in prop::collection::vec("[a-z]{0,10}", 1..10)) {
            let registry = FunctionRegistry::new();
            for description in &descriptions {
                registry
                    .register_descriptor(FunctionDescriptor::new("f", description.as_str()))
                    .unwrap();
            }
            let resolved = registry.resolve("f").unwrap();
            prop_assert_eq!(&resolved.description, descriptions.last().unwrap());
            prop_assert_eq!(registry.len(), 1);
        }

        #[test]
        fn declared_and_typed_arguments_validate(
            max_results in any::<i64>(),
            keywords in prop::collection::vec("[a-z]{1,8}", 0..5),
        ) {
            let descriptor = catalog::collect_tweets();
            let arguments = args(json!({"max_results": max_results, "keywords": keywords}));
            prop_assert!(descriptor.validate_arguments(&arguments).is_ok());
        }
    }
}
