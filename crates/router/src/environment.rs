// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The environment: a compiled filter plus the controller running the
//! compiled policy, built as one unit.

use parking_lot::Mutex;
use sift_builder::{PolicyBuilder, Registry};
use sift_core::name::tag;
use sift_core::{Error, Event, Expression, Name, TraceRecord};
use sift_engine::Controller;
use sift_storage::Store;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A runnable entry artifact. The controller is serialized behind a
/// mutex: one ingest at a time, from whichever worker holds the entry.
pub struct Environment {
    filter: Option<Expression>,
    controller: Mutex<Controller>,
    policy_hash: String,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("policy_hash", &self.policy_hash)
            .finish_non_exhaustive()
    }
}

impl Environment {
    pub fn policy_hash(&self) -> &str {
        &self.policy_hash
    }

    /// The compiled filter expression; `None` for tester environments.
    pub fn filter(&self) -> Option<&Expression> {
        self.filter.as_ref()
    }

    pub fn assets(&self) -> HashSet<String> {
        self.controller.lock().assets().clone()
    }

    pub fn ingest(&self, event: Event) -> Event {
        self.controller.lock().ingest(event)
    }

    pub fn ingest_trace(&self, event: Event) -> (Event, Vec<TraceRecord>) {
        self.controller.lock().ingest_trace(event)
    }

    pub fn ingest_deadline(
        &self,
        event: Event,
        deadline: Instant,
    ) -> Result<(Event, Vec<TraceRecord>), Error> {
        self.controller.lock().ingest_deadline(event, deadline)
    }

    pub fn stop(&self) {
        self.controller.lock().stop();
    }
}

/// Compiles a policy name plus a filter name into an [`Environment`].
pub struct EnvironmentBuilder {
    policies: PolicyBuilder,
}

impl EnvironmentBuilder {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>) -> Self {
        Self {
            policies: PolicyBuilder::new(store, registry),
        }
    }

    /// Build a production environment from a policy and a filter.
    pub fn build(&self, policy: &Name, filter: &Name) -> Result<Environment, Error> {
        if !filter.has_tag(tag::FILTER) {
            return Err(Error::InvalidArgument(format!(
                "'{filter}' is not a filter name"
            )));
        }
        let mut environment = self.build_policy_environment(policy, filter)?;
        match self.policies.build_asset(filter) {
            Ok(expression) => {
                environment.filter = Some(expression);
                Ok(environment)
            }
            Err(err) => {
                environment.stop();
                Err(Self::context(policy, Some(filter), err))
            }
        }
    }

    /// Build a tester environment: policy only, no filter gate.
    pub fn build_test(&self, policy: &Name) -> Result<Environment, Error> {
        self.build_policy_environment(policy, policy)
    }

    fn build_policy_environment(
        &self,
        policy: &Name,
        context_filter: &Name,
    ) -> Result<Environment, Error> {
        if !policy.has_tag(tag::POLICY) {
            return Err(Error::InvalidArgument(format!(
                "'{policy}' is not a policy name"
            )));
        }
        let compiled = self.policies.build_policy(policy).map_err(|err| {
            let filter = (context_filter != policy).then_some(context_filter);
            Self::context(policy, filter, err)
        })?;
        let controller = Controller::new(compiled.expression, compiled.assets);
        Ok(Environment {
            filter: None,
            controller: Mutex::new(controller),
            policy_hash: compiled.hash,
        })
    }

    fn context(policy: &Name, filter: Option<&Name>, err: Error) -> Error {
        let message = match filter {
            Some(filter) => format!(
                "failed to create environment with policy '{policy}' and filter '{filter}': {err}"
            ),
            None => format!("failed to create environment with policy '{policy}': {err}"),
        };
        match err {
            Error::InvalidArgument(_) => Error::InvalidArgument(message),
            Error::NotFound(_) => Error::NotFound(message),
            _ => Error::Compile(message),
        }
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
