// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wazuh-DB helpers: `wdb_update` and `wdb_query`.
//!
//! `wdb_update` writes whether the query was accepted (bool) to the
//! target; `wdb_query` stores the response payload (`""` when empty) and
//! fails on any non-OK code. Neither ever errors across the Term
//! boundary: connection problems become Failure traces.

use super::{format_name, params};
use crate::registry::{BuilderFn, Registry};
use sift_adapters::{QueryCode, WdbPool};
use sift_core::{Event, Expression, Parameter, RunResult};
use std::sync::Arc;

pub(crate) fn register(registry: &mut Registry, pool: Arc<WdbPool>) {
    registry.insert_default("wdb_update", wdb_builder(Arc::clone(&pool), false));
    registry.insert_default("wdb_query", wdb_builder(pool, true));
}

fn wdb_builder(pool: Arc<WdbPool>, return_payload: bool) -> BuilderFn {
    Box::new(move |ids, args| {
        let parameters = params(args, 1, 1)?;
        let name = format_name(args.helper, args.target, &parameters);
        let target = args.target.to_string();
        let operand = parameters
            .into_iter()
            .next()
            .unwrap_or(Parameter::Value(String::new()));
        let pool = Arc::clone(&pool);

        let success = format!("[{name}] -> Success");
        let query_missing = format!("[{name}] -> Failure: query reference not found");
        let query_empty = format!("[{name}] -> Failure: query is empty");
        let non_ok = format!("[{name}] -> Failure");
        let prefix = format!("[{name}] -> Failure: ");

        Ok(Expression::term(
            ids,
            name,
            Arc::new(move |mut event: Event| {
                let query = match &operand {
                    Parameter::Reference(path) => match event.get_string(path) {
                        None => return RunResult::failure(event, query_missing.clone()),
                        Some("") => return RunResult::failure(event, query_empty.clone()),
                        Some(text) => text.to_string(),
                    },
                    Parameter::Value(text) => text.clone(),
                };

                let (code, payload) = match pool.query(&query) {
                    Ok(response) => response,
                    Err(err) => {
                        return RunResult::failure(event, format!("{prefix}wazuh-db: {err}"))
                    }
                };

                if return_payload {
                    if code != QueryCode::Ok {
                        return RunResult::failure(event, non_ok.clone());
                    }
                    let text = payload.unwrap_or_default();
                    match event.set_string(&target, text) {
                        Ok(()) => RunResult::success(event, success.clone()),
                        Err(err) => RunResult::failure(event, format!("{prefix}{err}")),
                    }
                } else {
                    match event.set_bool(&target, code == QueryCode::Ok) {
                        Ok(()) => RunResult::success(event, success.clone()),
                        Err(err) => RunResult::failure(event, format!("{prefix}{err}")),
                    }
                }
            }),
        ))
    })
}

#[cfg(test)]
#[path = "wdb_tests.rs"]
mod tests;
