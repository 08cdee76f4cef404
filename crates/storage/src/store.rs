// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store abstraction: opaque key/value persistence for serialized
//! documents, addressed by [`Name`].

use sift_core::{Error, Name};
use thiserror::Error as ThisError;

/// Errors from store operations.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(Name),
    #[error("io error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => Error::NotFound(name.to_string()),
            io @ StoreError::Io { .. } => Error::Io(io.to_string()),
        }
    }
}

/// Name-addressed document storage.
///
/// The router persists its entry tables at `router/router/0` and
/// `router/tester/0`; the builder reads policy and asset documents.
pub trait Store: Send + Sync {
    fn read(&self, name: &Name) -> Result<Vec<u8>, StoreError>;

    fn write(&self, name: &Name, bytes: &[u8]) -> Result<(), StoreError>;

    /// All stored names whose leading parts equal `prefix`.
    fn list(&self, prefix: &Name) -> Result<Vec<Name>, StoreError>;
}
