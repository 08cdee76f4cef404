//! Tester path: isolated single-event runs, traces, wazuh-DB helpers,
//! and the per-test deadline.

use crate::prelude::*;
use sift_core::TraceLevel;
use sift_router::TesterApi;
use std::time::{Duration, Instant};

const CMP_DOCS: &[(&str, &str)] = &[
    (
        "rule/cmp/0",
        r#"{
            "name": "rule/cmp/0",
            "check": [ { "/a": "+s_eq/$b" } ],
            "normalize": [ { "map": { "/equal": true } } ]
        }"#,
    ),
    (
        "policy/cmp/0",
        r#"{ "name": "policy/cmp/0", "stages": { "rules": ["rule/cmp/0"] } }"#,
    ),
];

fn asset_outcome(traces: &[sift_core::TraceRecord], asset: &str) -> Option<bool> {
    traces
        .iter()
        .find(|r| r.node == asset)
        .map(|r| r.success)
}

#[test]
fn string_comparator_with_references() {
    let harness = Harness::new(CMP_DOCS);
    harness
        .orch
        .post_test_entry(test_entry("cmp", "policy/cmp/0"))
        .unwrap();

    // Equal references succeed
    let output = harness
        .orch
        .ingest_test(
            event(r#"{"a": "foo", "b": "foo"}"#),
            trace_options("cmp", TraceLevel::All),
        )
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert_eq!(output.event.get_bool("/equal"), Some(true));
    assert_eq!(asset_outcome(&output.traces, "rule/cmp/0"), Some(true));

    // Prefix mismatch fails
    let output = harness
        .orch
        .ingest_test(
            event(r#"{"a": "foo", "b": "fo"}"#),
            trace_options("cmp", TraceLevel::All),
        )
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert!(!output.event.exists("/equal"));
    assert_eq!(asset_outcome(&output.traces, "rule/cmp/0"), Some(false));

    // Missing reference fails
    let output = harness
        .orch
        .ingest_test(
            event(r#"{"a": "foo"}"#),
            trace_options("cmp", TraceLevel::All),
        )
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert!(!output.event.exists("/equal"));
    assert_eq!(asset_outcome(&output.traces, "rule/cmp/0"), Some(false));
}

#[test]
fn wdb_query_stores_the_response_payload() {
    let docs: &[(&str, &str)] = &[
        (
            "decoder/db/0",
            r#"{
                "name": "decoder/db/0",
                "normalize": [ { "map": { "/result": "+wdb_query/$q" } } ]
            }"#,
        ),
        (
            "policy/db/0",
            r#"{ "name": "policy/db/0", "stages": { "decoders": ["decoder/db/0"] } }"#,
        ),
    ];
    let harness = Harness::with_wdb_response(docs, "ok hello");
    harness
        .orch
        .post_test_entry(test_entry("db", "policy/db/0"))
        .unwrap();

    let output = harness
        .orch
        .ingest_test(
            event(r#"{"q": "agent 001 syscheck"}"#),
            trace_options("db", TraceLevel::None),
        )
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert_eq!(output.event.get_string("/result"), Some("hello"));
}

const SLOW_DOCS: &[(&str, &str)] = &[
    (
        "decoder/slow/0",
        r#"{
            "name": "decoder/slow/0",
            "normalize": [
                { "check": [ { "/slow": true } ], "map": { "/napped": "+sleep/2000" } },
                { "map": { "/done": true } }
            ]
        }"#,
    ),
    (
        "policy/slow/0",
        r#"{ "name": "policy/slow/0", "stages": { "decoders": ["decoder/slow/0"] } }"#,
    ),
];

#[test]
fn blocked_helper_times_out_within_the_budget() {
    let harness = Harness::with_timeout(SLOW_DOCS, Duration::from_millis(500));
    harness
        .orch
        .post_test_entry(test_entry("slow", "policy/slow/0"))
        .unwrap();

    let started = Instant::now();
    let result = harness
        .orch
        .ingest_test(
            event(r#"{"slow": true}"#),
            trace_options("slow", TraceLevel::All),
        )
        .blocking_recv()
        .unwrap();
    let elapsed = started.elapsed();

    let err = result.unwrap_err();
    assert_eq!(err.code(), "TIMEOUT");
    assert!(
        elapsed <= Duration::from_millis(700),
        "timeout took {elapsed:?}"
    );
}

#[test]
fn tests_keep_working_after_a_timeout() {
    let harness = Harness::with_timeout(SLOW_DOCS, Duration::from_millis(200));
    harness
        .orch
        .post_test_entry(test_entry("slow", "policy/slow/0"))
        .unwrap();

    let timed_out = harness
        .orch
        .ingest_test(
            event(r#"{"slow": true}"#),
            trace_options("slow", TraceLevel::None),
        )
        .blocking_recv()
        .unwrap();
    assert!(timed_out.is_err());

    // Give the wedged worker time to finish the sleep and restart the
    // environment, then run a fast event through the same entry.
    std::thread::sleep(Duration::from_millis(2300));
    let output = harness
        .orch
        .ingest_test(event(r#"{}"#), trace_options("slow", TraceLevel::None))
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert_eq!(output.event.get_bool("/done"), Some(true));
}

#[test]
fn missing_test_entry_resolves_not_found() {
    let harness = Harness::new(CMP_DOCS);
    let err = harness
        .orch
        .ingest_test(event("{}"), trace_options("ghost", TraceLevel::None))
        .blocking_recv()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn get_assets_lists_the_compiled_policy() {
    let harness = Harness::new(CMP_DOCS);
    harness
        .orch
        .post_test_entry(test_entry("cmp", "policy/cmp/0"))
        .unwrap();
    let assets = harness.orch.get_assets("cmp").unwrap();
    assert_eq!(
        assets,
        std::collections::HashSet::from(["rule/cmp/0".to_string()])
    );
}

#[test]
fn trace_levels_filter_what_comes_back() {
    let harness = Harness::new(CMP_DOCS);
    harness
        .orch
        .post_test_entry(test_entry("cmp", "policy/cmp/0"))
        .unwrap();
    let matching = r#"{"a": "x", "b": "x"}"#;

    let none = harness
        .orch
        .ingest_test(event(matching), trace_options("cmp", TraceLevel::None))
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert!(none.traces.is_empty());

    let asset_only = harness
        .orch
        .ingest_test(event(matching), trace_options("cmp", TraceLevel::AssetOnly))
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert_eq!(asset_only.traces.len(), 1);
    assert_eq!(asset_only.traces[0].node, "rule/cmp/0");

    let all = harness
        .orch
        .ingest_test(event(matching), trace_options("cmp", TraceLevel::All))
        .blocking_recv()
        .unwrap()
        .unwrap();
    assert!(all.traces.len() > asset_only.traces.len());
}
