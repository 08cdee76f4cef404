// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The canonical helper set and the shared builder plumbing.
//!
//! Every helper is a pure builder: classify the raw tokens, validate
//! arity, format the human name for tracing, and close over the resolved
//! parameters by value. Term closures never panic and never error across
//! the API; runtime problems become `RunResult::Failure` traces.

pub mod filter;
pub mod transform;
pub mod wdb;

use crate::registry::{HelperArgs, Registry};
use sift_adapters::WdbPool;
use sift_core::{Error, Event, Parameter};
use std::sync::Arc;

pub(crate) fn register_defaults(registry: &mut Registry, pool: Arc<WdbPool>) {
    filter::register(registry);
    transform::register(registry);
    wdb::register(registry, pool);
}

/// Classify tokens and enforce the helper's declared arity.
pub(crate) fn params(args: &HelperArgs<'_>, min: usize, max: usize) -> Result<Vec<Parameter>, Error> {
    if args.args.len() < min || args.args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min}..{max}")
        };
        return Err(Error::InvalidArgument(format!(
            "helper '{}' expects {expected} argument(s), got {}",
            args.helper,
            args.args.len()
        )));
    }
    Parameter::classify_all(args.args)
}

/// Human name used in traces: `helper(target, arg1, arg2, …)`.
pub(crate) fn format_name(helper: &str, target: &str, params: &[Parameter]) -> String {
    let mut name = format!("{helper}({target}");
    for param in params {
        name.push_str(", ");
        name.push_str(&param.to_string());
    }
    name.push(')');
    name
}

/// Resolve a parameter to an owned string: literals verbatim, references
/// through the event (string leaves only).
pub(crate) fn resolve_string(event: &Event, param: &Parameter) -> Option<String> {
    match param {
        Parameter::Value(text) => Some(text.clone()),
        Parameter::Reference(path) => event.get_string(path).map(str::to_string),
    }
}
