// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The policy compiler.
//!
//! A policy document lists its stages (decoders, rules, outputs), each an
//! ordered set of asset names. Members are loaded from the store, their
//! parent declarations resolved into a topological order, and each stage
//! composed with its own operator: decoders first-match (`Or`), rules
//! broadcast, outputs chained. Stages compose under the policy root
//! `Chain`, so later stages run regardless of earlier stage outcomes.

use crate::asset::{compile_asset, parse_asset, AssetDoc};
use crate::graph::AssetGraph;
use crate::registry::Registry;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sift_core::{Error, Expression, Name, NodeIdGen};
use sift_storage::Store;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PolicyDoc {
    name: Name,
    #[serde(default)]
    stages: Stages,
}

#[derive(Debug, Default, Deserialize)]
struct Stages {
    #[serde(default)]
    decoders: Vec<Name>,
    #[serde(default)]
    rules: Vec<Name>,
    #[serde(default)]
    outputs: Vec<Name>,
}

enum Composer {
    FirstMatch,
    Broadcast,
    Chain,
}

/// A compiled policy: the expression root, every asset name it
/// references, and the content hash of the canonicalized tree.
pub struct CompiledPolicy {
    pub expression: Expression,
    pub assets: HashSet<String>,
    pub hash: String,
}

impl std::fmt::Debug for CompiledPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPolicy")
            .field("assets", &self.assets)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

/// Compiles policies and single assets out of the store.
pub struct PolicyBuilder {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
}

impl PolicyBuilder {
    pub fn new(store: Arc<dyn Store>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Load and compile a single asset (the filter path).
    pub fn build_asset(&self, name: &Name) -> Result<Expression, Error> {
        let doc = self.load_asset(name)?;
        let mut ids = NodeIdGen::new();
        compile_asset(&self.registry, &mut ids, &doc)
    }

    /// Compile a policy into its expression tree, asset set and hash.
    pub fn build_policy(&self, name: &Name) -> Result<CompiledPolicy, Error> {
        let bytes = self.store.read(name).map_err(Error::from)?;
        let doc: PolicyDoc = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Compile(format!("policy '{name}' is malformed: {e}")))?;
        if doc.name != *name {
            return Err(Error::Compile(format!(
                "policy document '{}' does not match its store name '{name}'",
                doc.name
            )));
        }

        let mut ids = NodeIdGen::new();
        let mut assets = HashSet::new();
        let mut stage_exprs = Vec::new();

        let stages = [
            ("decoders", &doc.stages.decoders, Composer::FirstMatch),
            ("rules", &doc.stages.rules, Composer::Broadcast),
            ("outputs", &doc.stages.outputs, Composer::Chain),
        ];
        for (stage_name, members, composer) in stages {
            if members.is_empty() {
                continue;
            }
            let children = self.compile_stage(name, stage_name, members, &mut ids)?;
            for member in members {
                assets.insert(member.to_string());
            }
            let expr = match composer {
                Composer::FirstMatch => Expression::or(&mut ids, stage_name, children),
                Composer::Broadcast => Expression::broadcast(&mut ids, stage_name, children),
                Composer::Chain => Expression::chain(&mut ids, stage_name, children),
            };
            stage_exprs.push(expr);
        }

        if assets.is_empty() {
            return Err(Error::Compile(format!("policy '{name}' has no assets")));
        }

        let expression = Expression::chain(&mut ids, name.to_string(), stage_exprs);
        let mut canonical = String::new();
        expression.canonical(&mut canonical);
        let hash = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        debug!(policy = %name, assets = assets.len(), %hash, "compiled policy");

        Ok(CompiledPolicy {
            expression,
            assets,
            hash,
        })
    }

    /// Load stage members, order them parents-first, compile each.
    fn compile_stage(
        &self,
        policy: &Name,
        stage: &str,
        members: &[Name],
        ids: &mut NodeIdGen,
    ) -> Result<Vec<Expression>, Error> {
        let docs: Vec<AssetDoc> = members
            .iter()
            .map(|member| {
                self.load_asset(member).map_err(|e| {
                    Error::Compile(format!("policy '{policy}' {stage}: {e}"))
                })
            })
            .collect::<Result<_, _>>()?;

        let mut graph = AssetGraph::new(members)?;
        for doc in &docs {
            graph.declare_parents(&doc.name, &doc.parents)?;
        }
        let order = graph.topo_order()?;

        order
            .into_iter()
            .map(|idx| compile_asset(&self.registry, ids, &docs[idx]))
            .collect()
    }

    fn load_asset(&self, name: &Name) -> Result<AssetDoc, Error> {
        let bytes = self.store.read(name).map_err(Error::from)?;
        parse_asset(name, &bytes)
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
