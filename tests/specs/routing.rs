//! Production routing: priority selection and first-match dispatch.

use crate::prelude::*;
use sift_router::RouterApi;
use std::time::Duration;

const DOCS: &[(&str, &str)] = &[
    (
        "decoder/a/0",
        r#"{ "name": "decoder/a/0", "normalize": [ { "map": { "/handled_by": "a" } } ] }"#,
    ),
    (
        "decoder/b/0",
        r#"{ "name": "decoder/b/0", "normalize": [ { "map": { "/handled_by": "b" } } ] }"#,
    ),
    (
        "policy/a/0",
        r#"{ "name": "policy/a/0", "stages": { "decoders": ["decoder/a/0"] } }"#,
    ),
    (
        "policy/b/0",
        r#"{ "name": "policy/b/0", "stages": { "decoders": ["decoder/b/0"] } }"#,
    ),
    (
        "filter/has-x/0",
        r#"{ "name": "filter/has-x/0", "check": [ { "/x": "+exists" } ] }"#,
    ),
    (
        "filter/has-queue/0",
        r#"{ "name": "filter/has-queue/0", "check": [ { "/queue": "+exists" } ] }"#,
    ),
];

#[test]
fn lowest_priority_matching_entry_wins() {
    let harness = Harness::new(DOCS);
    harness
        .orch
        .post_entry(entry("A", "policy/a/0", "filter/has-x/0", 10))
        .unwrap();
    harness
        .orch
        .post_entry(entry("B", "policy/b/0", "filter/has-x/0", 20))
        .unwrap();

    harness.orch.post_event(event(r#"{"x": "v"}"#));
    assert!(harness.wait_until(Duration::from_secs(2), |h| h.delivered_count() == 1));

    let delivered = harness.delivered.lock().unwrap();
    assert_eq!(delivered[0].get_string("/handled_by"), Some("a"));
}

#[test]
fn insertion_order_does_not_beat_priority() {
    let harness = Harness::new(DOCS);
    // B first, but A has the lower priority value
    harness
        .orch
        .post_entry(entry("B", "policy/b/0", "filter/has-x/0", 20))
        .unwrap();
    harness
        .orch
        .post_entry(entry("A", "policy/a/0", "filter/has-x/0", 10))
        .unwrap();

    harness.orch.post_event(event(r#"{"x": "v"}"#));
    assert!(harness.wait_until(Duration::from_secs(2), |h| h.delivered_count() == 1));
    let delivered = harness.delivered.lock().unwrap();
    assert_eq!(delivered[0].get_string("/handled_by"), Some("a"));
}

#[test]
fn unmatched_events_are_dropped() {
    let harness = Harness::new(DOCS);
    harness
        .orch
        .post_entry(entry("A", "policy/a/0", "filter/has-x/0", 10))
        .unwrap();
    harness
        .orch
        .post_entry(entry("B", "policy/b/0", "filter/has-x/0", 20))
        .unwrap();

    harness.orch.post_event(event(r#"{"y": "v"}"#));
    // A matched control event proves the unmatched one was processed
    harness.orch.post_event(event(r#"{"x": "v"}"#));
    assert!(harness.wait_until(Duration::from_secs(2), |h| h.delivered_count() >= 1));
    std::thread::sleep(Duration::from_millis(50));

    let delivered = harness.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].get_string("/handled_by"), Some("a"));
}

#[test]
fn later_entry_serves_what_the_first_rejects() {
    let harness = Harness::new(DOCS);
    harness
        .orch
        .post_entry(entry("A", "policy/a/0", "filter/has-x/0", 10))
        .unwrap();
    harness
        .orch
        .post_entry(entry("B", "policy/b/0", "filter/has-queue/0", 20))
        .unwrap();

    harness.orch.post_event(event(r#"{"queue": 49}"#));
    assert!(harness.wait_until(Duration::from_secs(2), |h| h.delivered_count() == 1));
    let delivered = harness.delivered.lock().unwrap();
    assert_eq!(delivered[0].get_string("/handled_by"), Some("b"));
}

#[test]
fn raw_text_events_route_after_parsing() {
    let harness = Harness::new(DOCS);
    harness
        .orch
        .post_entry(entry("B", "policy/b/0", "filter/has-queue/0", 5))
        .unwrap();

    harness.orch.post_str_event("1:agent007:login failed").unwrap();
    assert!(harness.wait_until(Duration::from_secs(2), |h| h.delivered_count() == 1));

    let delivered = harness.delivered.lock().unwrap();
    assert_eq!(delivered[0].get_int("/queue"), Some(49));
    assert_eq!(delivered[0].get_string("/origin"), Some("agent007"));
    assert_eq!(delivered[0].get_string("/handled_by"), Some("b"));
}

#[test]
fn malformed_raw_text_is_rejected_up_front() {
    let harness = Harness::new(DOCS);
    let err = harness.orch.post_str_event("no-delimiters").unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");
}
