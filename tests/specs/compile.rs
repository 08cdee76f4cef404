//! Compile-time rejection and persistence invariants.

use crate::prelude::*;
use sift_core::Name;
use sift_router::{prod, RouterApi};

const CYCLIC_DOCS: &[(&str, &str)] = &[
    (
        "decoder/a/0",
        r#"{ "name": "decoder/a/0", "parents": ["decoder/b/0"], "check": [ { "/x": 1 } ] }"#,
    ),
    (
        "decoder/b/0",
        r#"{ "name": "decoder/b/0", "parents": ["decoder/a/0"], "check": [ { "/x": 2 } ] }"#,
    ),
    (
        "policy/cyclic/0",
        r#"{ "name": "policy/cyclic/0", "stages": { "decoders": ["decoder/a/0", "decoder/b/0"] } }"#,
    ),
    (
        "filter/any/0",
        r#"{ "name": "filter/any/0", "check": [ { "/x": "+exists" } ] }"#,
    ),
];

#[test]
fn cyclic_policy_is_rejected_and_entry_persists_in_error() {
    let harness = Harness::new(CYCLIC_DOCS);
    let err = harness
        .orch
        .post_entry(entry("broken", "policy/cyclic/0", "filter/any/0", 10))
        .unwrap_err();
    assert_eq!(err.code(), "COMPILE_ERROR");
    let message = err.to_string();
    assert!(message.contains("decoder/a/0"), "{message}");
    assert!(message.contains("decoder/b/0"), "{message}");

    // Entry stays, in Error state
    let stored = harness.orch.get_entry("broken").unwrap();
    assert_eq!(stored.state, prod::State::Error);

    // The table persisted with the entry in it
    let bytes = harness
        .store
        .read(&Name::parse("router/router/0").unwrap())
        .unwrap();
    let persisted: Vec<prod::Entry> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].name, "broken");
    assert_eq!(persisted[0].state, prod::State::Error);
}

#[test]
fn persisted_table_always_matches_memory() {
    let harness = Harness::new(CYCLIC_DOCS);
    // A valid single-asset policy for the happy paths
    harness.store.seed(
        &Name::parse("decoder/ok/0").unwrap(),
        r#"{ "name": "decoder/ok/0", "check": [ { "/x": "+exists" } ] }"#,
    );
    harness.store.seed(
        &Name::parse("policy/ok/0").unwrap(),
        r#"{ "name": "policy/ok/0", "stages": { "decoders": ["decoder/ok/0"] } }"#,
    );

    let read_persisted = |h: &Harness| -> Vec<prod::Entry> {
        let bytes = h
            .store
            .read(&Name::parse("router/router/0").unwrap())
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    };
    let assert_in_sync = |h: &Harness| {
        let memory = h.orch.get_entries();
        let persisted = read_persisted(h);
        assert_eq!(memory.len(), persisted.len());
        for (m, p) in memory.iter().zip(persisted.iter()) {
            assert_eq!(m.name, p.name);
            assert_eq!(m.priority, p.priority);
            assert_eq!(m.state, p.state);
        }
    };

    harness
        .orch
        .post_entry(entry("one", "policy/ok/0", "filter/any/0", 1))
        .unwrap();
    assert_in_sync(&harness);

    harness
        .orch
        .post_entry(entry("two", "policy/ok/0", "filter/any/0", 2))
        .unwrap();
    assert_in_sync(&harness);

    harness.orch.change_entry_priority("two", 7).unwrap();
    assert_in_sync(&harness);

    harness.orch.reload_entry("one").unwrap();
    assert_in_sync(&harness);

    harness.orch.delete_entry("one").unwrap();
    assert_in_sync(&harness);
}

#[test]
fn identical_sources_compile_to_identical_hashes_across_instances() {
    let first = Harness::new(CYCLIC_DOCS);
    let second = Harness::new(CYCLIC_DOCS);
    for harness in [&first, &second] {
        harness.store.seed(
            &Name::parse("decoder/ok/0").unwrap(),
            r#"{ "name": "decoder/ok/0", "check": [ { "/x": "+exists" } ] }"#,
        );
        harness.store.seed(
            &Name::parse("policy/ok/0").unwrap(),
            r#"{ "name": "policy/ok/0", "stages": { "decoders": ["decoder/ok/0"] } }"#,
        );
        harness
            .orch
            .post_entry(entry("e", "policy/ok/0", "filter/any/0", 1))
            .unwrap();
    }
    assert_eq!(
        first.orch.get_entry("e").unwrap().policy_hash,
        second.orch.get_entry("e").unwrap().policy_hash
    );
}
