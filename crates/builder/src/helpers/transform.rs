// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transform helpers: field assignment.

use super::{format_name, params};
use crate::registry::{BuilderFn, Registry};
use serde_json::Value;
use sift_core::{Event, Expression, NodeIdGen, Parameter, RunResult};
use std::sync::Arc;

pub(crate) fn register(registry: &mut Registry) {
    registry.insert_default("set", set_builder());
}

/// What a `set` term writes: a literal document value or a copy of
/// another event field.
#[derive(Debug, Clone)]
pub(crate) enum SetOperand {
    Literal(Value),
    Reference(String),
}

/// Interpret a DSL literal as a JSON scalar: integers, doubles, booleans
/// and `null` get their natural types, everything else stays a string.
fn parse_scalar(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

fn set_builder() -> BuilderFn {
    Box::new(move |ids, args| {
        let parameters = params(args, 1, 1)?;
        let name = format_name(args.helper, args.target, &parameters);
        let operand = match parameters.into_iter().next() {
            Some(Parameter::Reference(path)) => SetOperand::Reference(path),
            Some(Parameter::Value(text)) => SetOperand::Literal(parse_scalar(&text)),
            None => SetOperand::Literal(Value::Null),
        };
        Ok(set_term_named(ids, name, args.target, operand))
    })
}

/// Term writing `operand` to `target`. Used both by the registered `set`
/// helper and by non-helper `map` entries in asset documents.
pub(crate) fn set_term(ids: &mut NodeIdGen, target: &str, operand: SetOperand) -> Expression {
    let display = match &operand {
        SetOperand::Literal(value) => value.to_string(),
        SetOperand::Reference(path) => format!("${}", path.trim_start_matches('/')),
    };
    let name = format!("set({target}, {display})");
    set_term_named(ids, name, target, operand)
}

fn set_term_named(
    ids: &mut NodeIdGen,
    name: String,
    target: &str,
    operand: SetOperand,
) -> Expression {
    let target = target.to_string();
    let success = format!("[{name}] -> Success");
    let missing_ref = format!("[{name}] -> Failure: reference not found");
    let prefix = format!("[{name}] -> Failure: ");

    Expression::term(
        ids,
        name,
        Arc::new(move |mut event: Event| {
            let value = match &operand {
                SetOperand::Literal(value) => value.clone(),
                SetOperand::Reference(path) => match event.get(path).cloned() {
                    Some(value) => value,
                    None => return RunResult::failure(event, missing_ref.clone()),
                },
            };
            match event.set(&target, value) {
                Ok(()) => RunResult::success(event, success.clone()),
                Err(err) => RunResult::failure(event, format!("{prefix}{err}")),
            }
        }),
    )
}

#[cfg(test)]
#[path = "transform_tests.rs"]
mod tests;
