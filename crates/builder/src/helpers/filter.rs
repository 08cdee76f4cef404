// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filter helpers: field presence and string/integer comparators.
//!
//! String comparison is byte-wise and case-sensitive; both sides must be
//! strings. Integer comparison prefers i64 on both sides; doubles are
//! compared only when both sides are doubles or convert without loss.

use super::{format_name, params};
use crate::registry::{BuilderFn, Registry};
use sift_core::{Event, Expression, Parameter, RunResult};
use std::cmp::Ordering;
use std::sync::Arc;

pub(crate) fn register(registry: &mut Registry) {
    registry.insert_default("exists", exists_builder(false));
    registry.insert_default("not_exists", exists_builder(true));
    for op in CmpOp::ALL {
        registry.insert_default(&format!("s_{}", op.suffix()), string_cmp_builder(op));
        registry.insert_default(&format!("i_{}", op.suffix()), int_cmp_builder(op));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    const ALL: [CmpOp; 6] = [
        CmpOp::Eq,
        CmpOp::Ne,
        CmpOp::Gt,
        CmpOp::Ge,
        CmpOp::Lt,
        CmpOp::Le,
    ];

    fn suffix(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
        }
    }

    fn matches(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
        }
    }
}

fn exists_builder(negated: bool) -> BuilderFn {
    Box::new(move |ids, args| {
        let parameters = params(args, 0, 0)?;
        let name = format_name(args.helper, args.target, &parameters);
        let target = args.target.to_string();
        let success = format!("[{name}] -> Success");
        let failure = format!("[{name}] -> Failure");
        Ok(Expression::term(
            ids,
            name,
            Arc::new(move |event: Event| {
                if event.exists(&target) != negated {
                    RunResult::success(event, success.clone())
                } else {
                    RunResult::failure(event, failure.clone())
                }
            }),
        ))
    })
}

fn string_cmp_builder(op: CmpOp) -> BuilderFn {
    Box::new(move |ids, args| {
        let parameters = params(args, 1, 1)?;
        let name = format_name(args.helper, args.target, &parameters);
        let target = args.target.to_string();
        let operand = parameters.into_iter().next().unwrap_or(Parameter::Value(String::new()));

        let success = format!("[{name}] -> Success");
        let missing_target =
            format!("[{name}] -> Failure: [{target}] not found or not a string");
        let missing_operand = format!("[{name}] -> Failure: comparison value not found");
        let no_match = format!("[{name}] -> Failure");

        Ok(Expression::term(
            ids,
            name,
            Arc::new(move |event: Event| {
                let Some(lhs) = event.get_string(&target).map(str::to_string) else {
                    return RunResult::failure(event, missing_target.clone());
                };
                let Some(rhs) = super::resolve_string(&event, &operand) else {
                    return RunResult::failure(event, missing_operand.clone());
                };
                if op.matches(lhs.as_bytes().cmp(rhs.as_bytes())) {
                    RunResult::success(event, success.clone())
                } else {
                    RunResult::failure(event, no_match.clone())
                }
            }),
        ))
    })
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

fn event_num(event: &Event, path: &str) -> Option<Num> {
    let value = event.get(path)?;
    if let Some(i) = value.as_i64() {
        return Some(Num::Int(i));
    }
    value.as_f64().map(Num::Float)
}

fn literal_num(text: &str) -> Option<Num> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Num::Int(i));
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Num::Float)
}

/// Lossless i64 → f64 widening, or nothing.
fn widen(i: i64) -> Option<f64> {
    let f = i as f64;
    (f as i64 == i).then_some(f)
}

fn compare_nums(lhs: Num, rhs: Num) -> Option<Ordering> {
    match (lhs, rhs) {
        (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
        (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
        (Num::Int(a), Num::Float(b)) => widen(a)?.partial_cmp(&b),
        (Num::Float(a), Num::Int(b)) => a.partial_cmp(&widen(b)?),
    }
}

fn int_cmp_builder(op: CmpOp) -> BuilderFn {
    Box::new(move |ids, args| {
        let parameters = params(args, 1, 1)?;
        let name = format_name(args.helper, args.target, &parameters);
        let target = args.target.to_string();
        let operand = parameters.into_iter().next().unwrap_or(Parameter::Value(String::new()));

        let success = format!("[{name}] -> Success");
        let not_numeric = format!("[{name}] -> Failure: both sides must be numeric");
        let no_match = format!("[{name}] -> Failure");

        Ok(Expression::term(
            ids,
            name,
            Arc::new(move |event: Event| {
                let lhs = event_num(&event, &target);
                let rhs = match &operand {
                    Parameter::Value(text) => literal_num(text),
                    Parameter::Reference(path) => event_num(&event, path),
                };
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => match compare_nums(lhs, rhs) {
                        Some(ord) if op.matches(ord) => {
                            RunResult::success(event, success.clone())
                        }
                        _ => RunResult::failure(event, no_match.clone()),
                    },
                    _ => RunResult::failure(event, not_numeric.clone()),
                }
            }),
        ))
    })
}

/// Operand of an implicit value-match check entry.
#[derive(Debug, Clone)]
pub(crate) enum MatchOperand {
    Literal(serde_json::Value),
    Reference(String),
}

/// Term comparing the value at `target` against a literal document value
/// or another event field. Used by `check` entries that are not helper
/// calls.
pub(crate) fn value_match(
    ids: &mut sift_core::NodeIdGen,
    target: &str,
    operand: MatchOperand,
) -> Expression {
    let display = match &operand {
        MatchOperand::Literal(value) => value.to_string(),
        MatchOperand::Reference(path) => format!("${}", path.trim_start_matches('/')),
    };
    let name = format!("match({target}, {display})");
    let target = target.to_string();
    let success = format!("[{name}] -> Success");
    let failure = format!("[{name}] -> Failure");

    Expression::term(
        ids,
        name,
        Arc::new(move |event: Event| {
            let matched = match &operand {
                MatchOperand::Literal(value) => event.get(&target) == Some(value),
                MatchOperand::Reference(path) => match (event.get(&target), event.get(path)) {
                    (Some(lhs), Some(rhs)) => lhs == rhs,
                    _ => false,
                },
            };
            if matched {
                RunResult::success(event, success.clone())
            } else {
                RunResult::failure(event, failure.clone())
            }
        }),
    )
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
