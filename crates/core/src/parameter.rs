// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helper-call parameters: literal values and event references.

use crate::error::Error;

/// A classified helper argument.
///
/// A token starting with `$` is a reference into the event; the stored
/// path is a normalized JSON pointer (leading slash added). Anything else
/// is a literal value passed verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Value(String),
    Reference(String),
}

impl Parameter {
    /// Classify a raw DSL token.
    pub fn classify(token: &str) -> Result<Self, Error> {
        if token.is_empty() {
            return Err(Error::InvalidArgument("empty helper argument".to_string()));
        }
        match token.strip_prefix('$') {
            Some("") => Err(Error::InvalidArgument(
                "reference argument '$' has no path".to_string(),
            )),
            Some(path) => Ok(Parameter::Reference(normalize_pointer(path))),
            None => Ok(Parameter::Value(token.to_string())),
        }
    }

    /// Classify a whole token list, failing on the first bad token.
    pub fn classify_all(tokens: &[String]) -> Result<Vec<Self>, Error> {
        tokens.iter().map(|t| Self::classify(t)).collect()
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parameter::Value(v) => write!(f, "{v}"),
            Parameter::Reference(path) => {
                write!(f, "${}", path.strip_prefix('/').unwrap_or(path))
            }
        }
    }
}

/// Normalize a reference path to a JSON pointer with a leading slash.
pub fn normalize_pointer(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
#[path = "parameter_tests.rs"]
mod tests;
