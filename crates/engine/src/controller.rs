// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The controller: a compiled expression tree made runnable.
//!
//! `ingest` is synchronous and single-threaded within one controller;
//! callers serialize access (one ingest at a time). Subscriptions are
//! per-node observer callbacks fired only during traced ingests; handlers
//! must not block and only see the trace record, never the event.

use crate::run::{eval, Expired, RunCtx};
use sift_core::{Error, Event, Expression, TraceRecord};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

pub type TraceHandler = Arc<dyn Fn(&TraceRecord) + Send + Sync>;

/// Opaque token returned by [`Controller::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

pub(crate) struct Subscription {
    pub handle: u64,
    pub node: String,
    pub handler: TraceHandler,
}

pub struct Controller {
    root: Expression,
    assets: HashSet<String>,
    subscribers: Vec<Subscription>,
    next_handle: u64,
}

impl Controller {
    /// Build a controller from a compiled expression and the names of
    /// the assets it contains.
    pub fn new(root: Expression, assets: HashSet<String>) -> Self {
        Self {
            root,
            assets,
            subscribers: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn assets(&self) -> &HashSet<String> {
        &self.assets
    }

    /// Run the event through the tree, no traces, no deadline.
    pub fn ingest(&mut self, event: Event) -> Event {
        let mut ctx = RunCtx::new(None, false, &self.assets, &self.subscribers);
        match eval(&self.root, event, &mut ctx) {
            Ok(result) => result.into_event(),
            Err(Expired(event)) => event,
        }
    }

    /// Run with per-node trace taps installed.
    pub fn ingest_trace(&mut self, event: Event) -> (Event, Vec<TraceRecord>) {
        let mut ctx = RunCtx::new(None, true, &self.assets, &self.subscribers);
        match eval(&self.root, event, &mut ctx) {
            Ok(result) => (result.into_event(), ctx.records),
            Err(Expired(event)) => (event, ctx.records),
        }
    }

    /// Traced run that aborts at the first node boundary past `deadline`.
    pub fn ingest_deadline(
        &mut self,
        event: Event,
        deadline: Instant,
    ) -> Result<(Event, Vec<TraceRecord>), Error> {
        let mut ctx = RunCtx::new(Some(deadline), true, &self.assets, &self.subscribers);
        match eval(&self.root, event, &mut ctx) {
            Ok(result) => Ok((result.into_event(), ctx.records)),
            Err(Expired(_)) => Err(Error::Timeout("ingest deadline exceeded".to_string())),
        }
    }

    /// Observe every trace record emitted for `node` during traced
    /// ingests. The handler must not block.
    pub fn subscribe(&mut self, node: impl Into<String>, handler: TraceHandler) -> SubscriptionHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.subscribers.push(Subscription {
            handle,
            node: node.into(),
            handler,
        });
        SubscriptionHandle(handle)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.handle != handle.0);
        self.subscribers.len() != before
    }

    /// Drain subscribers and retire the controller.
    pub fn stop(&mut self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
