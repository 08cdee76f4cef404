// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recursive expression evaluator.
//!
//! Evaluation is strictly sequential in tree order. Trace records and
//! subscriber callbacks only happen when tracing is on; a deadline, when
//! set, is checked before every node and aborts the walk at the next
//! node boundary.

use crate::controller::Subscription;
use sift_core::{Event, Expression, RunResult, TraceRecord};
use std::collections::HashSet;
use std::time::Instant;

/// Raised when the deadline fires; carries the event back out.
pub(crate) struct Expired(pub Event);

pub(crate) struct RunCtx<'a> {
    pub deadline: Option<Instant>,
    pub tracing: bool,
    pub assets: &'a HashSet<String>,
    pub subscribers: &'a [Subscription],
    pub records: Vec<TraceRecord>,
    asset_stack: Vec<String>,
}

impl<'a> RunCtx<'a> {
    pub(crate) fn new(
        deadline: Option<Instant>,
        tracing: bool,
        assets: &'a HashSet<String>,
        subscribers: &'a [Subscription],
    ) -> Self {
        Self {
            deadline,
            tracing,
            assets,
            subscribers,
            records: Vec::new(),
            asset_stack: Vec::new(),
        }
    }

    fn record(&mut self, node: &str, success: bool, message: &str) {
        if !self.tracing {
            return;
        }
        let record = TraceRecord {
            asset: self.asset_stack.last().cloned().unwrap_or_default(),
            node: node.to_string(),
            success,
            message: message.to_string(),
        };
        for subscription in self.subscribers {
            if subscription.node == record.node {
                (subscription.handler)(&record);
            }
        }
        self.records.push(record);
    }
}

/// Run an expression with no tracing and no deadline.
///
/// Used by workers to evaluate entry filters against an event.
pub fn run_expression(expr: &Expression, event: Event) -> RunResult {
    let assets = HashSet::new();
    let mut ctx = RunCtx::new(None, false, &assets, &[]);
    match eval(expr, event, &mut ctx) {
        Ok(result) => result,
        // No deadline was set; keep the event anyway.
        Err(Expired(event)) => RunResult::failure(event, "expired"),
    }
}

pub(crate) fn eval(
    expr: &Expression,
    event: Event,
    ctx: &mut RunCtx<'_>,
) -> Result<RunResult, Expired> {
    if let Some(deadline) = ctx.deadline {
        if Instant::now() >= deadline {
            return Err(Expired(event));
        }
    }

    let is_asset = ctx.tracing && ctx.assets.contains(expr.name());
    if is_asset {
        ctx.asset_stack.push(expr.name().to_string());
    }
    let out = eval_inner(expr, event, ctx);
    if let Ok(result) = &out {
        ctx.record(expr.name(), result.is_success(), result.trace());
    }
    if is_asset {
        ctx.asset_stack.pop();
    }
    out
}

fn eval_inner(
    expr: &Expression,
    event: Event,
    ctx: &mut RunCtx<'_>,
) -> Result<RunResult, Expired> {
    match expr {
        Expression::Term(term) => Ok((term.op)(event)),

        // Left-to-right, stops at the first failure.
        Expression::And(and) => {
            let mut event = event;
            for child in &and.children {
                let (next, success, _) = eval(child, event, ctx)?.into_parts();
                if !success {
                    return Ok(RunResult::failure(next, "failure"));
                }
                event = next;
            }
            Ok(RunResult::success(event, "success"))
        }

        // Left-to-right, stops at the first success.
        Expression::Or(or) => {
            let mut event = event;
            for child in &or.children {
                let (next, success, _) = eval(child, event, ctx)?.into_parts();
                if success {
                    return Ok(RunResult::success(next, "success"));
                }
                event = next;
            }
            Ok(RunResult::failure(event, "failure"))
        }

        // Ignores child outcomes, always succeeds.
        Expression::Chain(chain) => {
            let mut event = event;
            for child in &chain.children {
                event = eval(child, event, ctx)?.into_event();
            }
            Ok(RunResult::success(event, "success"))
        }

        // Runs every child, always succeeds. Children are sequential:
        // a controller is single-threaded within one ingest.
        Expression::Broadcast(broadcast) => {
            let mut event = event;
            for child in &broadcast.children {
                event = eval(child, event, ctx)?.into_event();
            }
            Ok(RunResult::success(event, "success"))
        }

        // Consequent runs only on antecedent success; the outcome is the
        // antecedent's either way.
        Expression::Implication(imp) => {
            let (next, success, _) = eval(&imp.antecedent, event, ctx)?.into_parts();
            if success {
                let event = eval(&imp.consequent, next, ctx)?.into_event();
                Ok(RunResult::success(event, "success"))
            } else {
                Ok(RunResult::failure(next, "failure"))
            }
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
