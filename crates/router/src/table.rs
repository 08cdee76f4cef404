// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The routing tables: priority-ordered production entries and the
//! name-addressed tester entries with lazy lifetime reaping.

use crate::environment::Environment;
use crate::types::{prod, test};
use sift_core::Error;
use std::sync::Arc;
use std::time::Instant;

/// A production entry with its compiled environment, when built.
pub(crate) struct Slot {
    pub entry: prod::Entry,
    pub environment: Option<Arc<Environment>>,
}

/// Production table, kept sorted by `(priority, name)`. Priorities are
/// pairwise distinct at all times.
#[derive(Default)]
pub(crate) struct RoutingTable {
    slots: Vec<Slot>,
}

impl RoutingTable {
    pub fn insert(&mut self, entry: prod::Entry) -> Result<(), Error> {
        if self.slots.iter().any(|s| s.entry.name == entry.name) {
            return Err(Error::AlreadyExists(format!("entry '{}'", entry.name)));
        }
        if self.slots.iter().any(|s| s.entry.priority == entry.priority) {
            return Err(Error::AlreadyExists(format!(
                "priority {} is busy",
                entry.priority
            )));
        }
        self.slots.push(Slot {
            entry,
            environment: None,
        });
        self.sort();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Slot> {
        let idx = self.slots.iter().position(|s| s.entry.name == name)?;
        Some(self.slots.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.entry.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.entry.name == name)
    }

    /// Move an entry to a free priority slot.
    pub fn change_priority(&mut self, name: &str, priority: u32) -> Result<(), Error> {
        if self
            .slots
            .iter()
            .any(|s| s.entry.priority == priority && s.entry.name != name)
        {
            return Err(Error::AlreadyExists(format!("priority {priority} is busy")));
        }
        let slot = self
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("entry '{name}'")))?;
        slot.entry.priority = priority;
        self.sort();
        Ok(())
    }

    /// Snapshot of the entries, in routing order.
    pub fn entries(&self) -> Vec<prod::Entry> {
        self.slots.iter().map(|s| s.entry.clone()).collect()
    }

    /// The ordered `(name, environment)` handles a worker walks for one
    /// event: built environments of entries that are not disabled. An
    /// entry left in Error by a failed reload keeps serving with its
    /// previous environment.
    pub fn active(&self) -> Vec<(String, Arc<Environment>)> {
        self.slots
            .iter()
            .filter(|s| s.entry.state != prod::State::Disabled)
            .filter_map(|s| {
                let env = s.environment.clone()?;
                Some((s.entry.name.clone(), env))
            })
            .collect()
    }

    fn sort(&mut self) {
        self.slots.sort_by(|a, b| {
            (a.entry.priority, &a.entry.name).cmp(&(b.entry.priority, &b.entry.name))
        });
    }
}

/// A tester entry with its environment and inactivity clock.
pub(crate) struct TestSlot {
    pub entry: test::Entry,
    pub environment: Option<Arc<Environment>>,
    pub last_use: Instant,
}

/// Tester table. Entries expire after `lifetime_secs` of inactivity and
/// are reaped lazily on admin or tester access.
#[derive(Default)]
pub(crate) struct TestTable {
    slots: Vec<TestSlot>,
}

impl TestTable {
    pub fn insert(&mut self, entry: test::Entry) -> Result<(), Error> {
        if self.slots.iter().any(|s| s.entry.name == entry.name) {
            return Err(Error::AlreadyExists(format!("test entry '{}'", entry.name)));
        }
        self.slots.push(TestSlot {
            entry,
            environment: None,
            last_use: Instant::now(),
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<TestSlot> {
        let idx = self.slots.iter().position(|s| s.entry.name == name)?;
        Some(self.slots.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&TestSlot> {
        self.slots.iter().find(|s| s.entry.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TestSlot> {
        self.slots.iter_mut().find(|s| s.entry.name == name)
    }

    pub fn touch(&mut self, name: &str) {
        if let Some(slot) = self.get_mut(name) {
            slot.last_use = Instant::now();
        }
    }

    pub fn entries(&self) -> Vec<test::Entry> {
        self.slots.iter().map(|s| s.entry.clone()).collect()
    }

    /// Remove entries idle past their lifetime; returns the reaped slots
    /// so the caller can stop their controllers outside the lock.
    pub fn reap_expired(&mut self, now: Instant) -> Vec<TestSlot> {
        let mut reaped = Vec::new();
        let mut idx = 0;
        while idx < self.slots.len() {
            let slot = &self.slots[idx];
            let lifetime = slot.entry.lifetime_secs;
            let expired = lifetime > 0
                && now.saturating_duration_since(slot.last_use).as_secs() >= lifetime;
            if expired {
                reaped.push(self.slots.remove(idx));
            } else {
                idx += 1;
            }
        }
        reaped
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
