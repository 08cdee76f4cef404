use super::*;
use crate::store::{Store, StoreError};

fn name(text: &str) -> Name {
    Name::parse(text).unwrap()
}

#[test]
fn seed_then_read() {
    let store = MemStore::new();
    store.seed(&name("filter/allow-all/0"), "{}");
    assert_eq!(store.read(&name("filter/allow-all/0")).unwrap(), b"{}");
}

#[test]
fn read_missing_is_not_found() {
    let store = MemStore::new();
    assert!(matches!(
        store.read(&name("policy/x/0")),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn list_matches_whole_parts_only() {
    let store = MemStore::new();
    store.seed(&name("rule/audit/0"), "{}");
    store.seed(&name("rule/audit-extra/0"), "{}");

    let listed = store.list(&name("rule/audit")).unwrap();
    assert_eq!(listed, vec![name("rule/audit/0")]);
}

#[test]
fn write_overwrites() {
    let store = MemStore::new();
    let doc = name("router/tester/0");
    store.write(&doc, b"a").unwrap();
    store.write(&doc, b"b").unwrap();
    assert_eq!(store.read(&doc).unwrap(), b"b");
}
