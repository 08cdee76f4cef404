// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asset dependency graph: an arena of nodes with integer indices.
//!
//! Members are stored in declaration order; the topological order puts
//! parents before children and is stable with respect to declaration
//! order among independent assets. Cycles are compile errors naming the
//! assets on the cycle.

use sift_core::{Error, Name};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug)]
pub struct AssetGraph {
    nodes: Vec<Name>,
    index: HashMap<Name, usize>,
    parents: Vec<Vec<usize>>,
}

impl AssetGraph {
    /// Build an arena over the stage members, rejecting duplicates.
    pub fn new(members: &[Name]) -> Result<Self, Error> {
        let mut index = HashMap::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            if index.insert(member.clone(), i).is_some() {
                return Err(Error::Compile(format!(
                    "asset '{member}' appears twice in the stage"
                )));
            }
        }
        Ok(Self {
            nodes: members.to_vec(),
            parents: vec![Vec::new(); members.len()],
            index,
        })
    }

    /// Record `child`'s declared parents. Both ends must be members.
    pub fn declare_parents(&mut self, child: &Name, parents: &[Name]) -> Result<(), Error> {
        let child_idx = *self.index.get(child).ok_or_else(|| {
            Error::Compile(format!("asset '{child}' is not a member of the stage"))
        })?;
        for parent in parents {
            let parent_idx = *self.index.get(parent).ok_or_else(|| {
                Error::Compile(format!(
                    "asset '{child}' declares unknown parent '{parent}'"
                ))
            })?;
            self.parents[child_idx].push(parent_idx);
        }
        Ok(())
    }

    pub fn name(&self, idx: usize) -> &Name {
        &self.nodes[idx]
    }

    /// Topological order (parents first) via coloring DFS.
    pub fn topo_order(&self) -> Result<Vec<usize>, Error> {
        let mut colors = vec![Color::White; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut path = Vec::new();
        for node in 0..self.nodes.len() {
            self.visit(node, &mut colors, &mut order, &mut path)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        node: usize,
        colors: &mut [Color],
        order: &mut Vec<usize>,
        path: &mut Vec<usize>,
    ) -> Result<(), Error> {
        match colors[node] {
            Color::Black => Ok(()),
            Color::Gray => Err(self.cycle_error(node, path)),
            Color::White => {
                colors[node] = Color::Gray;
                path.push(node);
                for &parent in &self.parents[node] {
                    self.visit(parent, colors, order, path)?;
                }
                path.pop();
                colors[node] = Color::Black;
                order.push(node);
                Ok(())
            }
        }
    }

    fn cycle_error(&self, node: usize, path: &[usize]) -> Error {
        let start = path.iter().position(|&n| n == node).unwrap_or(0);
        let mut names: Vec<String> = path[start..]
            .iter()
            .map(|&n| self.nodes[n].to_string())
            .collect();
        names.push(self.nodes[node].to_string());
        Error::Compile(format!("cycle in asset graph: {}", names.join(" -> ")))
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
