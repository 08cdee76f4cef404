// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helper DSL syntax: `+helper_name/arg1/arg2/...`
//!
//! `\/` escapes a literal slash inside an argument and `\\` a literal
//! backslash. Arguments starting with `$` are classified downstream as
//! event references by [`sift_core::Parameter`].

use sift_core::Error;

/// A tokenized helper invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperCall {
    pub helper: String,
    pub args: Vec<String>,
}

/// Whether a clause value is a helper invocation rather than a literal.
pub fn is_helper_call(text: &str) -> bool {
    text.starts_with('+')
}

/// Tokenize a `+helper/arg/...` string.
pub fn parse_helper_call(text: &str) -> Result<HelperCall, Error> {
    let Some(body) = text.strip_prefix('+') else {
        return Err(Error::InvalidArgument(format!(
            "helper call '{text}' does not start with '+'"
        )));
    };
    let mut tokens = split_escaped(body);
    if tokens.is_empty() || tokens[0].is_empty() {
        return Err(Error::InvalidArgument(format!(
            "helper call '{text}' has no helper name"
        )));
    }
    let helper = tokens.remove(0);
    Ok(HelperCall {
        helper,
        args: tokens,
    })
}

/// Split on `/`, honoring `\/` and `\\` escapes.
fn split_escaped(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped @ ('/' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            '/' => tokens.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    tokens.push(current);
    tokens
}

#[cfg(test)]
#[path = "dsl_tests.rs"]
mod tests;
