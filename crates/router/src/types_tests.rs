use super::*;
use sift_core::Name;

#[test]
fn entry_from_post_starts_building() {
    let post = prod::EntryPost {
        name: "default".to_string(),
        policy: Name::parse("policy/p/0").unwrap(),
        filter: Name::parse("filter/f/0").unwrap(),
        priority: 10,
        description: Some("primary route".to_string()),
        disabled: false,
    };
    let entry = prod::Entry::from_post(&post);
    assert_eq!(entry.state, prod::State::Building);
    assert_eq!(entry.priority, 10);
    assert_eq!(entry.description.as_deref(), Some("primary route"));
    assert!(entry.policy_hash.is_empty());
    assert!(entry.last_error.is_none());
}

#[test]
fn prod_entry_serde_round_trips() {
    let entry = prod::Entry {
        name: "default".to_string(),
        policy: Name::parse("policy/p/0").unwrap(),
        filter: Name::parse("filter/f/0").unwrap(),
        priority: 42,
        state: prod::State::Enabled,
        description: None,
        policy_hash: "abc".to_string(),
        last_error: None,
    };
    let json = serde_json::to_string(&entry).unwrap();
    let back: prod::Entry = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, entry.name);
    assert_eq!(back.priority, entry.priority);
    assert_eq!(back.state, prod::State::Enabled);
}

#[test]
fn state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&prod::State::Building).unwrap(),
        "\"building\""
    );
}

#[test]
fn test_entry_defaults_survive_old_documents() {
    let json = r#"{
        "name": "t",
        "policy": "policy/p/0",
        "lifetime_secs": 60,
        "state": "enabled"
    }"#;
    let entry: test::Entry = serde_json::from_str(json).unwrap();
    assert!(entry.policy_hash.is_empty());
    assert!(entry.description.is_none());
}

#[test]
fn max_priority_is_below_two_to_the_31() {
    assert_eq!(u64::from(MAX_PRIORITY) + 1, 1 << 31);
}
