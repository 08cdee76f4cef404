// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory event document.
//!
//! An [`Event`] wraps a JSON value tree addressed by RFC-6901 pointers
//! (`/a/b/0/c`, with `~0` → `~` and `~1` → `/`). Typed getters return
//! `None` on absence *or* type mismatch. Setters create intermediate
//! objects as needed but fail when an existing intermediate is not an
//! object, and refuse array writes past the end (no null padding).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Document addressing/write errors, surfaced as Term failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocError {
    #[error("'{0}' is not a JSON pointer")]
    BadPointer(String),
    #[error("intermediate element of '{0}' is not an object")]
    NotAnObject(String),
    #[error("'{index}' in '{path}' is not a decimal array index")]
    BadIndex { path: String, index: String },
    #[error("index {index} in '{path}' is past the end of the array (len {len})")]
    PastEnd {
        path: String,
        index: usize,
        len: usize,
    },
    #[error("'{0}' is not an array")]
    NotAnArray(String),
    #[error("merge value is not an object")]
    MergeNotObject,
    #[error("number is not finite")]
    NonFiniteNumber,
}

/// A structured event document, exclusively owned by the worker
/// processing it and moved through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    doc: Value,
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl Event {
    /// An empty document (`{}`).
    pub fn new() -> Self {
        Self {
            doc: Value::Object(Map::new()),
        }
    }

    pub fn from_value(doc: Value) -> Self {
        Self { doc }
    }

    /// Parse a JSON text into a document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            doc: serde_json::from_str(text)?,
        })
    }

    pub fn value(&self) -> &Value {
        &self.doc
    }

    pub fn into_value(self) -> Value {
        self.doc
    }

    // -- reads --

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.doc.pointer(path)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.doc.pointer(path).is_some()
    }

    pub fn get_string(&self, path: &str) -> Option<&str> {
        self.get(path)?.as_str()
    }

    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    pub fn get_double(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    pub fn get_array(&self, path: &str) -> Option<&Vec<Value>> {
        match self.get(path)? {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn get_object(&self, path: &str) -> Option<&Map<String, Value>> {
        match self.get(path)? {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    // -- writes --

    /// Write `value` at `path`, creating intermediate objects as needed.
    ///
    /// Fails when an existing intermediate is not a container, when an
    /// array token is not a decimal index, or when an index is past the
    /// end (`index == len` appends).
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), DocError> {
        let tokens = split_pointer(path)?;
        if tokens.is_empty() {
            self.doc = value;
            return Ok(());
        }

        // The value is moved at most once; Option keeps the borrow
        // checker happy across loop iterations.
        let mut value = Some(value);
        let mut cur = &mut self.doc;
        let last = tokens.len() - 1;

        for (depth, token) in tokens.iter().enumerate() {
            let is_last = depth == last;
            match cur {
                Value::Object(map) => {
                    if is_last {
                        map.insert(token.clone(), value.take().unwrap_or(Value::Null));
                        return Ok(());
                    }
                    let slot = map
                        .entry(token.clone())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() && !slot.is_array() {
                        return Err(DocError::NotAnObject(path.to_string()));
                    }
                    cur = slot;
                }
                Value::Array(items) => {
                    let index = parse_index(token, path)?;
                    let len = items.len();
                    if is_last {
                        match index.cmp(&len) {
                            std::cmp::Ordering::Less => {
                                items[index] = value.take().unwrap_or(Value::Null)
                            }
                            std::cmp::Ordering::Equal => {
                                items.push(value.take().unwrap_or(Value::Null))
                            }
                            std::cmp::Ordering::Greater => {
                                return Err(DocError::PastEnd {
                                    path: path.to_string(),
                                    index,
                                    len,
                                })
                            }
                        }
                        return Ok(());
                    }
                    match index.cmp(&len) {
                        std::cmp::Ordering::Less => {
                            let slot = &mut items[index];
                            if !slot.is_object() && !slot.is_array() {
                                return Err(DocError::NotAnObject(path.to_string()));
                            }
                            cur = slot;
                        }
                        std::cmp::Ordering::Equal => {
                            items.push(Value::Object(Map::new()));
                            let last = items.len() - 1;
                            cur = &mut items[last];
                        }
                        std::cmp::Ordering::Greater => {
                            return Err(DocError::PastEnd {
                                path: path.to_string(),
                                index,
                                len,
                            })
                        }
                    }
                }
                _ => return Err(DocError::NotAnObject(path.to_string())),
            }
        }
        Ok(())
    }

    pub fn set_string(&mut self, path: &str, value: impl Into<String>) -> Result<(), DocError> {
        self.set(path, Value::String(value.into()))
    }

    pub fn set_int(&mut self, path: &str, value: i64) -> Result<(), DocError> {
        self.set(path, Value::from(value))
    }

    pub fn set_double(&mut self, path: &str, value: f64) -> Result<(), DocError> {
        let number = serde_json::Number::from_f64(value).ok_or(DocError::NonFiniteNumber)?;
        self.set(path, Value::Number(number))
    }

    pub fn set_bool(&mut self, path: &str, value: bool) -> Result<(), DocError> {
        self.set(path, Value::Bool(value))
    }

    /// Remove the addressed element. Returns whether anything was removed.
    pub fn erase(&mut self, path: &str) -> bool {
        let Some(cut) = path.rfind('/') else {
            return false;
        };
        let (parent, raw_token) = (&path[..cut], &path[cut + 1..]);
        let token = unescape(raw_token);
        match self.doc.pointer_mut(parent) {
            Some(Value::Object(map)) => map.remove(&token).is_some(),
            Some(Value::Array(items)) => match token.parse::<usize>() {
                Ok(index) if index < items.len() => {
                    items.remove(index);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Append to the array at `path`, creating it when absent.
    pub fn append(&mut self, path: &str, value: Value) -> Result<(), DocError> {
        if !self.exists(path) {
            return self.set(path, Value::Array(vec![value]));
        }
        match self.doc.pointer_mut(path) {
            Some(Value::Array(items)) => {
                items.push(value);
                Ok(())
            }
            _ => Err(DocError::NotAnArray(path.to_string())),
        }
    }

    /// Graft the fields of a JSON object into the document root.
    pub fn merge(&mut self, value: Value) -> Result<(), DocError> {
        let Value::Object(fields) = value else {
            return Err(DocError::MergeNotObject);
        };
        match &mut self.doc {
            Value::Object(root) => {
                for (key, field) in fields {
                    root.insert(key, field);
                }
                Ok(())
            }
            _ => Err(DocError::NotAnObject(String::new())),
        }
    }
}

fn split_pointer(path: &str) -> Result<Vec<String>, DocError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(DocError::BadPointer(path.to_string()));
    };
    Ok(rest.split('/').map(unescape).collect())
}

fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn parse_index(token: &str, path: &str) -> Result<usize, DocError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DocError::BadIndex {
            path: path.to_string(),
            index: token.to_string(),
        });
    }
    token.parse().map_err(|_| DocError::BadIndex {
        path: path.to_string(),
        index: token.to_string(),
    })
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
