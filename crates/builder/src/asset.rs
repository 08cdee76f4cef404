// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asset documents and their compilation to expressions.
//!
//! An asset carries a `check` clause (a filter expression) and zero or
//! more `normalize` blocks (transform expressions). The compiled shape is
//! `Implication(check, Chain(blocks))`, each block itself an implication
//! when it carries its own check. Filters are single check-only assets.

use crate::dsl::{is_helper_call, parse_helper_call};
use crate::helpers::filter::{value_match, MatchOperand};
use crate::helpers::transform::{set_term, SetOperand};
use crate::registry::Registry;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use sift_core::parameter::normalize_pointer;
use sift_core::{Error, Expression, Name, NodeIdGen, Parameter};

#[derive(Debug, Clone, Deserialize)]
pub struct AssetDoc {
    pub name: Name,
    #[serde(default)]
    pub parents: Vec<Name>,
    #[serde(default)]
    pub check: Vec<IndexMap<String, Value>>,
    #[serde(default)]
    pub normalize: Vec<NormalizeBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeBlock {
    #[serde(default)]
    pub check: Vec<IndexMap<String, Value>>,
    #[serde(default)]
    pub map: IndexMap<String, Value>,
}

/// Parse an asset document and verify it calls itself what the store
/// says it is.
pub fn parse_asset(name: &Name, bytes: &[u8]) -> Result<AssetDoc, Error> {
    let doc: AssetDoc = serde_json::from_slice(bytes)
        .map_err(|e| Error::Compile(format!("asset '{name}' is malformed: {e}")))?;
    if doc.name != *name {
        return Err(Error::Compile(format!(
            "asset document '{}' does not match its store name '{name}'",
            doc.name
        )));
    }
    Ok(doc)
}

/// Compile an asset into its expression, rooted at the asset name.
pub fn compile_asset(
    registry: &Registry,
    ids: &mut NodeIdGen,
    doc: &AssetDoc,
) -> Result<Expression, Error> {
    let asset = doc.name.to_string();
    let has_check = doc.check.iter().any(|entry| !entry.is_empty());
    let has_transforms = !doc.normalize.is_empty();

    match (has_check, has_transforms) {
        (true, true) => {
            let check = compile_checks(registry, ids, "check", &doc.check)?;
            let blocks = compile_blocks(registry, ids, &doc.name, &doc.normalize)?;
            let transforms = Expression::chain(ids, "normalize", blocks);
            Ok(Expression::implication(ids, asset, check, transforms))
        }
        (true, false) => compile_checks(registry, ids, &asset, &doc.check),
        (false, true) => {
            let blocks = compile_blocks(registry, ids, &doc.name, &doc.normalize)?;
            Ok(Expression::chain(ids, asset, blocks))
        }
        (false, false) => Err(Error::Compile(format!(
            "asset '{asset}' has neither check nor transforms"
        ))),
    }
}

fn compile_blocks(
    registry: &Registry,
    ids: &mut NodeIdGen,
    name: &Name,
    blocks: &[NormalizeBlock],
) -> Result<Vec<Expression>, Error> {
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| compile_block(registry, ids, name, i, block))
        .collect()
}

fn compile_block(
    registry: &Registry,
    ids: &mut NodeIdGen,
    name: &Name,
    index: usize,
    block: &NormalizeBlock,
) -> Result<Expression, Error> {
    if block.map.is_empty() {
        return Err(Error::Compile(format!(
            "asset '{name}': normalize block {index} has no map"
        )));
    }
    let mut terms = Vec::with_capacity(block.map.len());
    for (target, value) in &block.map {
        terms.push(compile_map_entry(registry, ids, target, value)?);
    }
    let map = Expression::chain(ids, "map", terms);

    if block.check.iter().any(|entry| !entry.is_empty()) {
        let check = compile_checks(registry, ids, "check", &block.check)?;
        Ok(Expression::implication(ids, format!("block/{index}"), check, map))
    } else {
        Ok(map)
    }
}

fn compile_checks(
    registry: &Registry,
    ids: &mut NodeIdGen,
    name: &str,
    entries: &[IndexMap<String, Value>],
) -> Result<Expression, Error> {
    let mut terms = Vec::new();
    for entry in entries {
        for (target, value) in entry {
            terms.push(compile_check_entry(registry, ids, target, value)?);
        }
    }
    Ok(Expression::and(ids, name, terms))
}

fn compile_check_entry(
    registry: &Registry,
    ids: &mut NodeIdGen,
    target: &str,
    value: &Value,
) -> Result<Expression, Error> {
    let target = normalize_pointer(target);
    match value {
        Value::String(text) if is_helper_call(text) => {
            registry.build(ids, &target, &parse_helper_call(text)?)
        }
        Value::String(text) if text.starts_with('$') => {
            let operand = match Parameter::classify(text)? {
                Parameter::Reference(path) => MatchOperand::Reference(path),
                Parameter::Value(literal) => MatchOperand::Literal(Value::String(literal)),
            };
            Ok(value_match(ids, &target, operand))
        }
        literal => Ok(value_match(ids, &target, MatchOperand::Literal(literal.clone()))),
    }
}

fn compile_map_entry(
    registry: &Registry,
    ids: &mut NodeIdGen,
    target: &str,
    value: &Value,
) -> Result<Expression, Error> {
    let target = normalize_pointer(target);
    match value {
        Value::String(text) if is_helper_call(text) => {
            registry.build(ids, &target, &parse_helper_call(text)?)
        }
        Value::String(text) if text.starts_with('$') => {
            let operand = match Parameter::classify(text)? {
                Parameter::Reference(path) => SetOperand::Reference(path),
                Parameter::Value(literal) => SetOperand::Literal(Value::String(literal)),
            };
            Ok(set_term(ids, &target, operand))
        }
        literal => Ok(set_term(ids, &target, SetOperand::Literal(literal.clone()))),
    }
}

#[cfg(test)]
#[path = "asset_tests.rs"]
mod tests;
