// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker threads: consume the production and test queues.
//!
//! A worker snapshots the ordered active entries under the shared read
//! lock, releases it, then walks the snapshot evaluating filters; the
//! first match runs that entry's controller and the walk stops. Test
//! jobs run the named entry's controller with trace taps and a deadline.

use crate::orchestrator::Shared;
use crate::types::{prod, test};
use crossbeam_channel::{never, select, Receiver};
use parking_lot::Mutex;
use sift_core::{Error, Event, TraceLevel, TraceRecord};
use sift_engine::run_expression;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Take-once fulfillment slot for a test future. Both the worker and
/// the deadline watchdog race to take the sender; the loser's result is
/// discarded, so the future resolves exactly once and on time.
pub(crate) type ReplySlot = Arc<Mutex<Option<oneshot::Sender<Result<test::Output, Error>>>>>;

/// Fulfill the future if nobody has yet. Returns whether this call won.
pub(crate) fn fulfill(reply: &ReplySlot, result: Result<test::Output, Error>) -> bool {
    match reply.lock().take() {
        Some(sender) => {
            let _ = sender.send(result);
            true
        }
        None => false,
    }
}

/// One queued test job.
pub(crate) struct TestRequest {
    pub event: Event,
    pub options: test::Options,
    pub reply: ReplySlot,
    /// Absolute deadline, set at enqueue so queue wait counts too.
    pub deadline: Instant,
}

pub(crate) struct Worker {
    handle: std::thread::JoinHandle<()>,
}

impl Worker {
    pub fn spawn(
        id: usize,
        shared: Arc<Shared>,
        prod_rx: Receiver<Event>,
        test_rx: Receiver<TestRequest>,
    ) -> std::io::Result<Self> {
        let handle = std::thread::Builder::new()
            .name(format!("sift-worker-{id}"))
            .spawn(move || run(&shared, prod_rx, test_rx))?;
        Ok(Self { handle })
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("worker thread terminated abnormally");
        }
    }
}

/// Blocking loop over both queues. A closed channel is swapped for a
/// `never` receiver so the select keeps serving the other queue until
/// both are drained and closed.
fn run(shared: &Shared, mut prod_rx: Receiver<Event>, mut test_rx: Receiver<TestRequest>) {
    debug!("worker started");
    let mut prod_open = true;
    let mut test_open = true;
    while prod_open || test_open {
        select! {
            recv(prod_rx) -> msg => match msg {
                Ok(event) => handle_event(shared, event),
                Err(_) => {
                    prod_open = false;
                    prod_rx = never();
                }
            },
            recv(test_rx) -> msg => match msg {
                Ok(request) => handle_test(shared, request),
                Err(_) => {
                    test_open = false;
                    test_rx = never();
                }
            },
        }
    }
    debug!("worker stopped");
}

/// First-match dispatch: lowest priority wins, exactly one controller
/// runs. Unmatched events are dropped.
fn handle_event(shared: &Shared, event: Event) {
    let snapshot = shared.router.read().active();
    let mut event = event;
    for (name, environment) in snapshot {
        let Some(filter) = environment.filter() else {
            continue;
        };
        let (next, matched, _) = run_expression(filter, event).into_parts();
        event = next;
        if matched {
            let processed = environment.ingest(event);
            debug!(entry = %name, "event routed");
            if let Some(delivery) = &shared.delivery {
                delivery(processed);
            }
            return;
        }
    }
    debug!("event matched no routing entry, dropping");
}

fn handle_test(shared: &Shared, request: TestRequest) {
    let TestRequest {
        event,
        options,
        reply,
        deadline,
    } = request;

    let environment = {
        let mut table = shared.tester.write();
        table.touch(&options.entry_name);
        table.get(&options.entry_name).and_then(|slot| {
            (slot.entry.state != prod::State::Disabled)
                .then(|| slot.environment.clone())
                .flatten()
        })
    };
    let Some(environment) = environment else {
        fulfill(
            &reply,
            Err(Error::NotFound(format!(
                "test entry '{}'",
                options.entry_name
            ))),
        );
        return;
    };

    match environment.ingest_deadline(event, deadline) {
        Ok((event, traces)) => {
            let traces = filter_traces(traces, &options);
            fulfill(&reply, Ok(test::Output { event, traces }));
        }
        Err(err @ Error::Timeout(_)) => {
            warn!(entry = %options.entry_name, "test ingestion timed out");
            fulfill(&reply, Err(err));
            restart_test_environment(shared, &options.entry_name);
        }
        Err(other) => {
            fulfill(&reply, Err(other));
        }
    }
}

/// Keep only what the request asked for: nothing, asset roots, or all
/// nodes; then narrow to the requested assets when a filter is given.
fn filter_traces(mut traces: Vec<TraceRecord>, options: &test::Options) -> Vec<TraceRecord> {
    match options.trace_level {
        TraceLevel::None => return Vec::new(),
        TraceLevel::AssetOnly => traces.retain(|r| !r.asset.is_empty() && r.node == r.asset),
        TraceLevel::All => {}
    }
    if !options.asset_filter.is_empty() {
        traces.retain(|r| options.asset_filter.contains(&r.asset));
    }
    traces
}

/// A controller abandoned at a deadline may hold a wedged helper; build
/// a fresh environment so later tests start clean.
fn restart_test_environment(shared: &Shared, name: &str) {
    let policy = {
        let table = shared.tester.read();
        table.get(name).map(|slot| slot.entry.policy.clone())
    };
    let Some(policy) = policy else {
        return;
    };
    match shared.env_builder.build_test(&policy) {
        Ok(environment) => {
            let mut table = shared.tester.write();
            if let Some(slot) = table.get_mut(name) {
                if let Some(old) = slot.environment.replace(Arc::new(environment)) {
                    old.stop();
                }
                slot.entry.state = prod::State::Enabled;
                slot.entry.last_error = None;
            }
        }
        Err(err) => {
            error!(entry = name, error = %err, "failed to restart test environment");
            let mut table = shared.tester.write();
            if let Some(slot) = table.get_mut(name) {
                slot.entry.state = prod::State::Error;
                slot.entry.last_error = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
