// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store used by tests and embedding hosts that manage their
//! own persistence.

use crate::store::{Store, StoreError};
use parking_lot::RwLock;
use sift_core::Name;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemStore {
    docs: RwLock<BTreeMap<Name, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, replacing any existing content.
    pub fn seed(&self, name: &Name, bytes: impl Into<Vec<u8>>) {
        self.docs.write().insert(name.clone(), bytes.into());
    }
}

impl Store for MemStore {
    fn read(&self, name: &Name) -> Result<Vec<u8>, StoreError> {
        self.docs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.clone()))
    }

    fn write(&self, name: &Name, bytes: &[u8]) -> Result<(), StoreError> {
        self.docs.write().insert(name.clone(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &Name) -> Result<Vec<Name>, StoreError> {
        let docs = self.docs.read();
        Ok(docs
            .keys()
            .filter(|name| name.parts().starts_with(prefix.parts()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "mem_store_tests.rs"]
mod tests;
