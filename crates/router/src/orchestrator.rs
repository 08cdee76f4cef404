// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator: entry tables, worker pool, queues, persistence.
//!
//! One reader/writer lock per table: admin operations take exclusive
//! access, workers take shared access only long enough to snapshot.
//! Every admin mutation serializes the full table back to the store, so
//! the persisted state always matches memory once the call returns.

use crate::api::{RouterApi, TesterApi, TestFuture};
use crate::environment::EnvironmentBuilder;
use crate::table::{RoutingTable, TestTable};
use crate::types::{prod, test, DeliveryFn, MAX_PRIORITY};
use crate::worker::{fulfill, ReplySlot, TestRequest, Worker};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use sift_adapters::parse_event;
use sift_builder::Registry;
use sift_core::name::tag;
use sift_core::{Error, Event, Name};
use sift_storage::Store;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Store documents holding the serialized tables.
const STORE_PATH_ROUTER_TABLE: &str = "router/router/0";
const STORE_PATH_TESTER_TABLE: &str = "router/tester/0";

/// How long `stop` waits for queued work to drain before joining.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// State shared between the orchestrator and its workers.
pub(crate) struct Shared {
    pub router: RwLock<RoutingTable>,
    pub tester: RwLock<TestTable>,
    pub env_builder: EnvironmentBuilder,
    pub test_timeout: Duration,
    pub delivery: Option<DeliveryFn>,
}

/// Orchestrator configuration.
pub struct Options {
    pub workers: usize,
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub event_queue_capacity: usize,
    pub test_queue_capacity: usize,
    pub test_timeout: Duration,
    /// Receives every document a matched controller produced. `None`
    /// drops them after the outputs stage has run.
    pub delivery: Option<DeliveryFn>,
}

impl Options {
    fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidArgument(
                "orchestrator needs at least one worker".to_string(),
            ));
        }
        if self.event_queue_capacity == 0 || self.test_queue_capacity == 0 {
            return Err(Error::InvalidArgument(
                "queue capacities must be non-zero".to_string(),
            ));
        }
        if self.test_timeout.is_zero() {
            return Err(Error::InvalidArgument(
                "test timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

struct Queues {
    prod_tx: Sender<Event>,
    test_tx: Sender<TestRequest>,
    prod_rx: Receiver<Event>,
    test_rx: Receiver<TestRequest>,
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    store: Arc<dyn Store>,
    router_table: Name,
    tester_table: Name,
    queues: Mutex<Option<Queues>>,
    workers: Mutex<Vec<Worker>>,
    worker_count: usize,
    shutting_down: AtomicBool,
}

impl Orchestrator {
    /// Build the orchestrator and restore both tables from the store,
    /// rebuilding every persisted entry concurrently. Entries that fail
    /// to build stay in the table in Error state.
    pub fn new(options: Options) -> Result<Self, Error> {
        options.validate()?;
        let router_table = Name::parse(STORE_PATH_ROUTER_TABLE)?;
        let tester_table = Name::parse(STORE_PATH_TESTER_TABLE)?;

        let shared = Arc::new(Shared {
            router: RwLock::new(RoutingTable::default()),
            tester: RwLock::new(TestTable::default()),
            env_builder: EnvironmentBuilder::new(Arc::clone(&options.store), options.registry),
            test_timeout: options.test_timeout,
            delivery: options.delivery,
        });

        let (prod_tx, prod_rx) = bounded(options.event_queue_capacity);
        let (test_tx, test_rx) = bounded(options.test_queue_capacity);

        let orchestrator = Self {
            shared,
            store: options.store,
            router_table,
            tester_table,
            queues: Mutex::new(Some(Queues {
                prod_tx,
                test_tx,
                prod_rx,
                test_rx,
            })),
            workers: Mutex::new(Vec::new()),
            worker_count: options.workers,
            shutting_down: AtomicBool::new(false),
        };
        orchestrator.restore_tables();
        Ok(orchestrator)
    }

    /// Spawn the worker pool. Idempotent.
    pub fn start(&self) -> Result<(), Error> {
        self.ensure_running()?;
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return Ok(());
        }
        let queues = self.queues.lock();
        let Some(queues) = queues.as_ref() else {
            return Err(Error::ShuttingDown);
        };
        for id in 0..self.worker_count {
            let worker = Worker::spawn(
                id,
                Arc::clone(&self.shared),
                queues.prod_rx.clone(),
                queues.test_rx.clone(),
            )
            .map_err(|e| Error::Io(format!("failed to spawn worker: {e}")))?;
            workers.push(worker);
        }
        info!(workers = self.worker_count, "orchestrator started");
        Ok(())
    }

    /// Shut down: reject new work, give queued work a bounded grace to
    /// drain, close the queues and join the workers.
    pub fn stop(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let draining = !self.workers.lock().is_empty();
        if let Some(queues) = self.queues.lock().take() {
            let grace_until = Instant::now() + SHUTDOWN_GRACE;
            while draining
                && (!queues.prod_tx.is_empty() || !queues.test_tx.is_empty())
                && Instant::now() < grace_until
            {
                std::thread::sleep(Duration::from_millis(10));
            }
            // Dropping the senders closes both channels; workers drain
            // what is left and exit.
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            worker.join();
        }
        info!("orchestrator stopped");
    }

    fn ensure_running(&self) -> Result<(), Error> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    // -- persistence --

    fn persist_router(&self) -> Result<(), Error> {
        let entries = self.shared.router.read().entries();
        let bytes =
            serde_json::to_vec_pretty(&entries).map_err(|e| Error::Io(e.to_string()))?;
        self.store
            .write(&self.router_table, &bytes)
            .map_err(Error::from)
    }

    fn persist_tester(&self) -> Result<(), Error> {
        let entries = self.shared.tester.read().entries();
        let bytes =
            serde_json::to_vec_pretty(&entries).map_err(|e| Error::Io(e.to_string()))?;
        self.store
            .write(&self.tester_table, &bytes)
            .map_err(Error::from)
    }

    fn restore_tables(&self) {
        for entry in self.read_table::<prod::Entry>(&self.router_table) {
            let mut table = self.shared.router.write();
            if let Err(err) = table.insert(entry.clone()) {
                warn!(entry = %entry.name, error = %err, "skipping persisted entry");
            }
        }
        for entry in self.read_table::<test::Entry>(&self.tester_table) {
            let mut table = self.shared.tester.write();
            if let Err(err) = table.insert(entry.clone()) {
                warn!(entry = %entry.name, error = %err, "skipping persisted test entry");
            }
        }
        self.rebuild_all();
    }

    fn read_table<T: serde::de::DeserializeOwned>(&self, name: &Name) -> Vec<T> {
        let bytes = match self.store.read(name) {
            Ok(bytes) => bytes,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(table = %name, error = %err, "persisted table is malformed, starting empty");
                Vec::new()
            }
        }
    }

    /// Rebuild every restored entry's environment, concurrently.
    fn rebuild_all(&self) {
        let prod_entries = self.shared.router.read().entries();
        let test_entries = self.shared.tester.read().entries();

        let (prod_built, test_built) = std::thread::scope(|scope| {
            let prod_handles: Vec<_> = prod_entries
                .iter()
                .map(|entry| {
                    let builder = &self.shared.env_builder;
                    scope.spawn(move || builder.build(&entry.policy, &entry.filter))
                })
                .collect();
            let test_handles: Vec<_> = test_entries
                .iter()
                .map(|entry| {
                    let builder = &self.shared.env_builder;
                    scope.spawn(move || builder.build_test(&entry.policy))
                })
                .collect();

            let join = |handles: Vec<std::thread::ScopedJoinHandle<'_, _>>| {
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(Error::Compile("environment build panicked".to_string()))
                        })
                    })
                    .collect::<Vec<_>>()
            };
            (join(prod_handles), join(test_handles))
        });

        {
            let mut table = self.shared.router.write();
            for (entry, built) in prod_entries.iter().zip(prod_built) {
                let Some(slot) = table.get_mut(&entry.name) else {
                    continue;
                };
                match built {
                    Ok(environment) => {
                        slot.entry.policy_hash = environment.policy_hash().to_string();
                        slot.environment = Some(Arc::new(environment));
                        if slot.entry.state != prod::State::Disabled {
                            slot.entry.state = prod::State::Enabled;
                        }
                        slot.entry.last_error = None;
                    }
                    Err(err) => {
                        slot.entry.state = prod::State::Error;
                        slot.entry.last_error = Some(err.to_string());
                    }
                }
            }
        }
        {
            let mut table = self.shared.tester.write();
            for (entry, built) in test_entries.iter().zip(test_built) {
                let Some(slot) = table.get_mut(&entry.name) else {
                    continue;
                };
                match built {
                    Ok(environment) => {
                        slot.entry.policy_hash = environment.policy_hash().to_string();
                        slot.environment = Some(Arc::new(environment));
                        slot.entry.state = prod::State::Enabled;
                        slot.entry.last_error = None;
                    }
                    Err(err) => {
                        slot.entry.state = prod::State::Error;
                        slot.entry.last_error = Some(err.to_string());
                    }
                }
            }
        }
    }

    // -- tester housekeeping --

    fn reap_tests(&self) {
        let reaped = self.shared.tester.write().reap_expired(Instant::now());
        if reaped.is_empty() {
            return;
        }
        for slot in &reaped {
            if let Some(environment) = &slot.environment {
                environment.stop();
            }
            debug!(entry = %slot.entry.name, "reaped expired test entry");
        }
        if let Err(err) = self.persist_tester() {
            warn!(error = %err, "failed to persist tester table after reap");
        }
    }

    fn validate_entry_names(name: &str, policy: &Name) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("entry name is empty".to_string()));
        }
        if !policy.has_tag(tag::POLICY) {
            return Err(Error::InvalidArgument(format!(
                "'{policy}' is not a policy name"
            )));
        }
        Ok(())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RouterApi for Orchestrator {
    fn post_entry(&self, post: prod::EntryPost) -> Result<(), Error> {
        self.ensure_running()?;
        Self::validate_entry_names(&post.name, &post.policy)?;
        if !post.filter.has_tag(tag::FILTER) {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a filter name",
                post.filter
            )));
        }
        if post.priority > MAX_PRIORITY {
            return Err(Error::InvalidArgument(format!(
                "priority {} is out of range",
                post.priority
            )));
        }

        // Insert in Building state, then compile without holding the
        // table lock.
        self.shared
            .router
            .write()
            .insert(prod::Entry::from_post(&post))?;
        let built = self.shared.env_builder.build(&post.policy, &post.filter);

        let result = {
            let mut table = self.shared.router.write();
            match (table.get_mut(&post.name), built) {
                // Deleted while building: nothing to update.
                (None, Ok(environment)) => {
                    environment.stop();
                    Ok(())
                }
                (None, Err(_)) => Ok(()),
                (Some(slot), Ok(environment)) => {
                    slot.entry.policy_hash = environment.policy_hash().to_string();
                    slot.environment = Some(Arc::new(environment));
                    slot.entry.state = if post.disabled {
                        prod::State::Disabled
                    } else {
                        prod::State::Enabled
                    };
                    slot.entry.last_error = None;
                    Ok(())
                }
                (Some(slot), Err(err)) => {
                    slot.entry.state = prod::State::Error;
                    slot.entry.last_error = Some(err.to_string());
                    Err(err)
                }
            }
        };
        self.persist_router()?;
        result
    }

    fn delete_entry(&self, name: &str) -> Result<(), Error> {
        self.ensure_running()?;
        let removed = self.shared.router.write().remove(name);
        let Some(slot) = removed else {
            return Err(Error::NotFound(format!("entry '{name}'")));
        };
        if let Some(environment) = slot.environment {
            environment.stop();
        }
        self.persist_router()
    }

    fn get_entry(&self, name: &str) -> Result<prod::Entry, Error> {
        self.shared
            .router
            .read()
            .get(name)
            .map(|slot| slot.entry.clone())
            .ok_or_else(|| Error::NotFound(format!("entry '{name}'")))
    }

    fn reload_entry(&self, name: &str) -> Result<(), Error> {
        self.ensure_running()?;
        let sources = {
            let table = self.shared.router.read();
            table
                .get(name)
                .map(|slot| (slot.entry.policy.clone(), slot.entry.filter.clone()))
        };
        let Some((policy, filter)) = sources else {
            return Err(Error::NotFound(format!("entry '{name}'")));
        };

        let built = self.shared.env_builder.build(&policy, &filter);
        let mut retired = None;
        let result = {
            let mut table = self.shared.router.write();
            match (table.get_mut(name), built) {
                (None, Ok(environment)) => {
                    environment.stop();
                    Err(Error::NotFound(format!("entry '{name}'")))
                }
                (None, Err(_)) => Err(Error::NotFound(format!("entry '{name}'"))),
                (Some(slot), Ok(environment)) => {
                    slot.entry.policy_hash = environment.policy_hash().to_string();
                    retired = slot.environment.replace(Arc::new(environment));
                    if slot.entry.state != prod::State::Disabled {
                        slot.entry.state = prod::State::Enabled;
                    }
                    slot.entry.last_error = None;
                    Ok(())
                }
                // The previous environment stays operational; only the
                // state records the failed rebuild.
                (Some(slot), Err(err)) => {
                    slot.entry.state = prod::State::Error;
                    slot.entry.last_error = Some(err.to_string());
                    Err(err)
                }
            }
        };
        if let Some(old) = retired {
            old.stop();
        }
        self.persist_router()?;
        result
    }

    fn change_entry_priority(&self, name: &str, priority: u32) -> Result<(), Error> {
        self.ensure_running()?;
        if priority > MAX_PRIORITY {
            return Err(Error::InvalidArgument(format!(
                "priority {priority} is out of range"
            )));
        }
        self.shared.router.write().change_priority(name, priority)?;
        self.persist_router()
    }

    fn get_entries(&self) -> Vec<prod::Entry> {
        self.shared.router.read().entries()
    }

    fn post_event(&self, event: Event) {
        let sender = self.queues.lock().as_ref().map(|q| q.prod_tx.clone());
        match sender {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("event queue closed, dropping event");
                }
            }
            None => warn!("orchestrator stopped, dropping event"),
        }
    }

    fn try_post_event(&self, event: Event) -> Result<(), Error> {
        let sender = self.queues.lock().as_ref().map(|q| q.prod_tx.clone());
        let Some(tx) = sender else {
            return Err(Error::ShuttingDown);
        };
        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::ShuttingDown),
        }
    }

    fn post_str_event(&self, event: &str) -> Result<(), Error> {
        let parsed = parse_event(event)
            .map_err(|e| Error::InvalidArgument(format!("cannot parse event: {e}")))?;
        self.post_event(parsed);
        Ok(())
    }
}

impl TesterApi for Orchestrator {
    fn post_test_entry(&self, post: test::EntryPost) -> Result<(), Error> {
        self.ensure_running()?;
        Self::validate_entry_names(&post.name, &post.policy)?;
        self.reap_tests();

        self.shared
            .tester
            .write()
            .insert(test::Entry::from_post(&post))?;
        let built = self.shared.env_builder.build_test(&post.policy);

        let result = {
            let mut table = self.shared.tester.write();
            match (table.get_mut(&post.name), built) {
                (None, Ok(environment)) => {
                    environment.stop();
                    Ok(())
                }
                (None, Err(_)) => Ok(()),
                (Some(slot), Ok(environment)) => {
                    slot.entry.policy_hash = environment.policy_hash().to_string();
                    slot.environment = Some(Arc::new(environment));
                    slot.entry.state = prod::State::Enabled;
                    slot.entry.last_error = None;
                    Ok(())
                }
                (Some(slot), Err(err)) => {
                    slot.entry.state = prod::State::Error;
                    slot.entry.last_error = Some(err.to_string());
                    Err(err)
                }
            }
        };
        self.persist_tester()?;
        result
    }

    fn delete_test_entry(&self, name: &str) -> Result<(), Error> {
        self.ensure_running()?;
        self.reap_tests();
        let removed = self.shared.tester.write().remove(name);
        let Some(slot) = removed else {
            return Err(Error::NotFound(format!("test entry '{name}'")));
        };
        if let Some(environment) = slot.environment {
            environment.stop();
        }
        self.persist_tester()
    }

    fn get_test_entry(&self, name: &str) -> Result<test::Entry, Error> {
        self.reap_tests();
        self.shared
            .tester
            .read()
            .get(name)
            .map(|slot| slot.entry.clone())
            .ok_or_else(|| Error::NotFound(format!("test entry '{name}'")))
    }

    fn reload_test_entry(&self, name: &str) -> Result<(), Error> {
        self.ensure_running()?;
        self.reap_tests();
        let policy = {
            let table = self.shared.tester.read();
            table.get(name).map(|slot| slot.entry.policy.clone())
        };
        let Some(policy) = policy else {
            return Err(Error::NotFound(format!("test entry '{name}'")));
        };

        let built = self.shared.env_builder.build_test(&policy);
        let mut retired = None;
        let result = {
            let mut table = self.shared.tester.write();
            match (table.get_mut(name), built) {
                (None, Ok(environment)) => {
                    environment.stop();
                    Err(Error::NotFound(format!("test entry '{name}'")))
                }
                (None, Err(_)) => Err(Error::NotFound(format!("test entry '{name}'"))),
                (Some(slot), Ok(environment)) => {
                    slot.entry.policy_hash = environment.policy_hash().to_string();
                    retired = slot.environment.replace(Arc::new(environment));
                    slot.entry.state = prod::State::Enabled;
                    slot.entry.last_error = None;
                    Ok(())
                }
                (Some(slot), Err(err)) => {
                    slot.entry.state = prod::State::Error;
                    slot.entry.last_error = Some(err.to_string());
                    Err(err)
                }
            }
        };
        if let Some(old) = retired {
            old.stop();
        }
        self.persist_tester()?;
        result
    }

    fn get_test_entries(&self) -> Vec<test::Entry> {
        self.reap_tests();
        self.shared.tester.read().entries()
    }

    fn ingest_test(&self, event: Event, options: test::Options) -> TestFuture {
        let (sender, future) = oneshot::channel();
        let reply: ReplySlot = Arc::new(Mutex::new(Some(sender)));
        if self.shutting_down.load(Ordering::SeqCst) {
            fulfill(&reply, Err(Error::ShuttingDown));
            return future;
        }
        self.reap_tests();

        let queue = self.queues.lock().as_ref().map(|q| q.test_tx.clone());
        let Some(test_tx) = queue else {
            fulfill(&reply, Err(Error::ShuttingDown));
            return future;
        };

        let deadline = Instant::now() + self.shared.test_timeout;
        let request = TestRequest {
            event,
            options,
            reply: Arc::clone(&reply),
            deadline,
        };
        match test_tx.try_send(request) {
            Ok(()) => {
                // The watchdog resolves the future at the deadline even
                // when the worker is wedged inside a blocking helper.
                let watchdog_reply = Arc::clone(&reply);
                let spawned = std::thread::Builder::new()
                    .name("sift-test-watchdog".to_string())
                    .spawn(move || {
                        let now = Instant::now();
                        if deadline > now {
                            std::thread::sleep(deadline - now);
                        }
                        fulfill(
                            &watchdog_reply,
                            Err(Error::Timeout("test timed out".to_string())),
                        );
                    });
                if spawned.is_err() {
                    warn!("failed to spawn test watchdog; relying on worker deadline");
                }
            }
            Err(TrySendError::Full(_)) => {
                fulfill(&reply, Err(Error::QueueFull));
            }
            Err(TrySendError::Disconnected(_)) => {
                fulfill(&reply, Err(Error::ShuttingDown));
            }
        }
        future
    }

    fn ingest_test_str(&self, event: &str, options: test::Options) -> TestFuture {
        match parse_event(event) {
            Ok(parsed) => self.ingest_test(parsed, options),
            Err(err) => {
                let (reply, future) = oneshot::channel();
                let _ = reply.send(Err(Error::InvalidArgument(format!(
                    "cannot parse event: {err}"
                ))));
                future
            }
        }
    }

    fn get_assets(&self, name: &str) -> Result<HashSet<String>, Error> {
        self.reap_tests();
        let table = self.shared.tester.read();
        let slot = table
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("test entry '{name}'")))?;
        let environment = slot
            .environment
            .as_ref()
            .ok_or_else(|| Error::NotFound(format!("test entry '{name}' is not built")))?;
        Ok(environment.assets())
    }

    fn get_test_timeout(&self) -> Duration {
        self.shared.test_timeout
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
