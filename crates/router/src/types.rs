// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing entry types for the production and tester tables.

use serde::{Deserialize, Serialize};
use sift_core::Event;
use std::sync::Arc;

/// Priorities live in `[0, 2^31)`.
pub const MAX_PRIORITY: u32 = (1 << 31) - 1;

/// Callback receiving every document a matched controller finished
/// processing. Delivery beyond this point is the embedder's concern.
pub type DeliveryFn = Arc<dyn Fn(Event) + Send + Sync>;

pub mod prod {
    use super::*;
    use sift_core::Name;

    /// Lifecycle state of a routing entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum State {
        Disabled,
        Enabled,
        Building,
        Error,
    }

    /// Request to create a production entry.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EntryPost {
        pub name: String,
        pub policy: Name,
        pub filter: Name,
        pub priority: u32,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub disabled: bool,
    }

    /// A routing entry as stored, persisted and returned by the API.
    /// The compiled environment lives alongside it in the table, never
    /// in the serialized form.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Entry {
        pub name: String,
        pub policy: Name,
        pub filter: Name,
        pub priority: u32,
        pub state: State,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub policy_hash: String,
        #[serde(default)]
        pub last_error: Option<String>,
    }

    impl Entry {
        pub fn from_post(post: &EntryPost) -> Self {
            Self {
                name: post.name.clone(),
                policy: post.policy.clone(),
                filter: post.filter.clone(),
                priority: post.priority,
                state: State::Building,
                description: post.description.clone(),
                policy_hash: String::new(),
                last_error: None,
            }
        }
    }
}

pub mod test {
    use super::*;
    use sift_core::{Name, TraceLevel, TraceRecord};
    use std::collections::HashSet;

    pub use super::prod::State;

    /// Request to create a tester entry.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct EntryPost {
        pub name: String,
        pub policy: Name,
        /// Seconds of inactivity before the entry is reaped; 0 never
        /// expires.
        pub lifetime_secs: u64,
        #[serde(default)]
        pub description: Option<String>,
    }

    /// A tester entry. Not priority-ordered; selected by name.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Entry {
        pub name: String,
        pub policy: Name,
        pub lifetime_secs: u64,
        pub state: State,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub policy_hash: String,
        #[serde(default)]
        pub last_error: Option<String>,
    }

    impl Entry {
        pub fn from_post(post: &EntryPost) -> Self {
            Self {
                name: post.name.clone(),
                policy: post.policy.clone(),
                lifetime_secs: post.lifetime_secs,
                state: State::Building,
                description: post.description.clone(),
                policy_hash: String::new(),
                last_error: None,
            }
        }
    }

    /// Options for a single test ingestion.
    #[derive(Debug, Clone, Default)]
    pub struct Options {
        pub entry_name: String,
        pub trace_level: TraceLevel,
        /// When non-empty, only traces from these assets are returned.
        pub asset_filter: HashSet<String>,
    }

    /// What a test ingestion resolves to.
    #[derive(Debug)]
    pub struct Output {
        pub event: Event,
        pub traces: Vec<TraceRecord>,
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
