// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hierarchical asset names (`policy/wazuh/0`, `filter/allow-all/0`).

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Type tags accepted as the first part of a [`Name`].
pub mod tag {
    pub const POLICY: &str = "policy";
    pub const FILTER: &str = "filter";
    pub const DECODER: &str = "decoder";
    pub const RULE: &str = "rule";
    pub const OUTPUT: &str = "output";
}

/// An ordered sequence of non-empty name parts.
///
/// The first part is the type tag (`policy`, `filter`, `decoder`, `rule`,
/// `output`). Equality and hashing are part-wise; serialization round-trips
/// through the `/`-joined text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    parts: Vec<String>,
}

impl Name {
    /// Parse a `/`-joined name, rejecting empty input and empty parts.
    pub fn parse(text: &str) -> Result<Self, Error> {
        if text.is_empty() {
            return Err(Error::InvalidArgument("name is empty".to_string()));
        }
        let parts: Vec<String> = text.split('/').map(str::to_string).collect();
        if parts.iter().any(String::is_empty) {
            return Err(Error::InvalidArgument(format!(
                "name '{text}' has an empty part"
            )));
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The leading type tag.
    pub fn type_tag(&self) -> &str {
        &self.parts[0]
    }

    /// Whether the leading part matches the given type tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.parts[0] == tag
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("/"))
    }
}

impl std::str::FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Name {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        Self::parse(&s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> String {
        name.to_string()
    }
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
