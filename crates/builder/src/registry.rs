// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The helper registry: `helper name → builder function`.
//!
//! Populated once during initialization and shared read-only afterwards
//! (`Arc<Registry>`); registration is append-only and duplicate names are
//! rejected. An unknown helper during compilation is a compile error for
//! the policy being built.

use crate::dsl::HelperCall;
use crate::helpers;
use sift_adapters::WdbPool;
use sift_core::{Error, Expression, NodeIdGen};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a helper builder needs: the target field (a normalized
/// JSON pointer), the helper name, and the raw argument tokens.
pub struct HelperArgs<'a> {
    pub target: &'a str,
    pub helper: &'a str,
    pub args: &'a [String],
}

pub type BuilderFn =
    Box<dyn Fn(&mut NodeIdGen, &HelperArgs<'_>) -> Result<Expression, Error> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    builders: HashMap<String, BuilderFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The canonical helper set, wired to the given wazuh-DB pool.
    pub fn with_defaults(wdb: Arc<WdbPool>) -> Self {
        let mut registry = Self::new();
        helpers::register_defaults(&mut registry, wdb);
        registry
    }

    /// Register a builder. Append-only: a duplicate name is rejected.
    pub fn register(&mut self, name: impl Into<String>, builder: BuilderFn) -> Result<(), Error> {
        let name = name.into();
        if self.builders.contains_key(&name) {
            return Err(Error::AlreadyExists(format!("helper '{name}'")));
        }
        self.builders.insert(name, builder);
        Ok(())
    }

    /// Register a built-in. Built-in names are distinct by construction,
    /// so a collision is simply ignored rather than surfaced.
    pub(crate) fn insert_default(&mut self, name: &str, builder: BuilderFn) {
        self.builders.entry(name.to_string()).or_insert(builder);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Build the expression for one helper call against a target field.
    pub fn build(
        &self,
        ids: &mut NodeIdGen,
        target: &str,
        call: &HelperCall,
    ) -> Result<Expression, Error> {
        let builder = self.builders.get(&call.helper).ok_or_else(|| {
            Error::Compile(format!("unknown helper '{}'", call.helper))
        })?;
        builder(
            ids,
            &HelperArgs {
                target,
                helper: &call.helper,
                args: &call.args,
            },
        )
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
