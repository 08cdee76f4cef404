// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node evaluation traces, collected only in tester mode.

use serde::{Deserialize, Serialize};

/// One node's evaluation outcome, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Name of the asset the node belongs to (empty for structural
    /// nodes above any asset root).
    pub asset: String,
    /// Human name of the node (`helper(target, args…)` for leaves).
    pub node: String,
    pub success: bool,
    pub message: String,
}

/// How much trace detail a tester request wants back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    /// No traces.
    #[default]
    None,
    /// One record per asset root only.
    AssetOnly,
    /// Every node.
    All,
}
