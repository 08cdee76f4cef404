// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two faces of the orchestrator: routing administration and the
//! tester. Admin surfaces (CLI/HTTP) forward to these traits.

use crate::types::{prod, test};
use sift_core::{Error, Event};
use std::collections::HashSet;
use std::time::Duration;

/// One-shot future fulfilled by a worker with the test outcome.
pub type TestFuture = tokio::sync::oneshot::Receiver<Result<test::Output, Error>>;

pub trait RouterApi: Send + Sync {
    fn post_entry(&self, entry: prod::EntryPost) -> Result<(), Error>;

    fn delete_entry(&self, name: &str) -> Result<(), Error>;

    fn get_entry(&self, name: &str) -> Result<prod::Entry, Error>;

    /// Rebuild an entry's environment from its current sources. On
    /// success the new environment swaps in atomically; on failure the
    /// previous one keeps serving and the failure is recorded.
    fn reload_entry(&self, name: &str) -> Result<(), Error>;

    /// Move an entry to a free priority slot. Collisions are rejected;
    /// swapping two entries requires an intermediate free slot.
    fn change_entry_priority(&self, name: &str, priority: u32) -> Result<(), Error>;

    fn get_entries(&self) -> Vec<prod::Entry>;

    /// Blocking push onto the production queue.
    fn post_event(&self, event: Event);

    /// Non-blocking push; `QueueFull` when the queue is at capacity.
    fn try_post_event(&self, event: Event) -> Result<(), Error>;

    /// Parse a raw text event and push it.
    fn post_str_event(&self, event: &str) -> Result<(), Error>;
}

pub trait TesterApi: Send + Sync {
    fn post_test_entry(&self, entry: test::EntryPost) -> Result<(), Error>;

    fn delete_test_entry(&self, name: &str) -> Result<(), Error>;

    fn get_test_entry(&self, name: &str) -> Result<test::Entry, Error>;

    fn reload_test_entry(&self, name: &str) -> Result<(), Error>;

    fn get_test_entries(&self) -> Vec<test::Entry>;

    /// Run one event against a named test entry with trace capture.
    /// The returned future resolves with the output, or with `Timeout`
    /// when the orchestrator's test timeout elapses first.
    fn ingest_test(&self, event: Event, options: test::Options) -> TestFuture;

    fn ingest_test_str(&self, event: &str, options: test::Options) -> TestFuture;

    /// Asset names of the entry's compiled policy.
    fn get_assets(&self, name: &str) -> Result<HashSet<String>, Error>;

    fn get_test_timeout(&self) -> Duration;
}
