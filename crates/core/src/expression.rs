// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The sum-typed expression tree both filters and policies compile to.
//!
//! A compiled tree is a DAG rooted at the policy/filter expression; the
//! compiler guarantees acyclicity and assigns every node a [`NodeId`]
//! unique within the tree. Terms wrap the pure operation; combinators
//! define short-circuit semantics evaluated by the engine:
//!
//! - `And`: left-to-right, stops at the first failure
//! - `Or`: left-to-right, stops at the first success
//! - `Chain`: runs every child, ignores outcomes, always succeeds
//! - `Broadcast`: runs every child, always succeeds
//! - `Implication`: consequent runs only when the antecedent succeeds;
//!   the outcome is the antecedent's

use crate::event::Event;
use crate::result::RunResult;
use std::sync::Arc;

/// The pure operation a [`Term`] wraps.
pub type TermOp = Arc<dyn Fn(Event) -> RunResult + Send + Sync>;

/// Stable node identifier, unique within one compiled tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Sequential id source threaded through one compilation.
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Clone)]
pub struct Term {
    pub id: NodeId,
    pub name: String,
    pub op: TermOp,
}

#[derive(Clone)]
pub struct Combinator {
    pub id: NodeId,
    pub name: String,
    pub children: Vec<Expression>,
}

#[derive(Clone)]
pub struct Implication {
    pub id: NodeId,
    pub name: String,
    pub antecedent: Box<Expression>,
    pub consequent: Box<Expression>,
}

#[derive(Clone)]
pub enum Expression {
    Term(Term),
    And(Combinator),
    Or(Combinator),
    Chain(Combinator),
    Broadcast(Combinator),
    Implication(Implication),
}

impl Expression {
    pub fn term(ids: &mut NodeIdGen, name: impl Into<String>, op: TermOp) -> Self {
        Expression::Term(Term {
            id: ids.next(),
            name: name.into(),
            op,
        })
    }

    pub fn and(ids: &mut NodeIdGen, name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::And(Combinator {
            id: ids.next(),
            name: name.into(),
            children,
        })
    }

    pub fn or(ids: &mut NodeIdGen, name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::Or(Combinator {
            id: ids.next(),
            name: name.into(),
            children,
        })
    }

    pub fn chain(ids: &mut NodeIdGen, name: impl Into<String>, children: Vec<Expression>) -> Self {
        Expression::Chain(Combinator {
            id: ids.next(),
            name: name.into(),
            children,
        })
    }

    pub fn broadcast(
        ids: &mut NodeIdGen,
        name: impl Into<String>,
        children: Vec<Expression>,
    ) -> Self {
        Expression::Broadcast(Combinator {
            id: ids.next(),
            name: name.into(),
            children,
        })
    }

    pub fn implication(
        ids: &mut NodeIdGen,
        name: impl Into<String>,
        antecedent: Expression,
        consequent: Expression,
    ) -> Self {
        Expression::Implication(Implication {
            id: ids.next(),
            name: name.into(),
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        })
    }

    pub fn id(&self) -> NodeId {
        match self {
            Expression::Term(t) => t.id,
            Expression::And(c)
            | Expression::Or(c)
            | Expression::Chain(c)
            | Expression::Broadcast(c) => c.id,
            Expression::Implication(i) => i.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Expression::Term(t) => &t.name,
            Expression::And(c)
            | Expression::Or(c)
            | Expression::Chain(c)
            | Expression::Broadcast(c) => &c.name,
            Expression::Implication(i) => &i.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Term(_) => "term",
            Expression::And(_) => "and",
            Expression::Or(_) => "or",
            Expression::Chain(_) => "chain",
            Expression::Broadcast(_) => "broadcast",
            Expression::Implication(_) => "implication",
        }
    }

    /// Visit every node depth-first, parents before children.
    pub fn visit(&self, f: &mut impl FnMut(&Expression)) {
        f(self);
        match self {
            Expression::Term(_) => {}
            Expression::And(c)
            | Expression::Or(c)
            | Expression::Chain(c)
            | Expression::Broadcast(c) => {
                for child in &c.children {
                    child.visit(f);
                }
            }
            Expression::Implication(i) => {
                i.antecedent.visit(f);
                i.consequent.visit(f);
            }
        }
    }

    /// Deterministic serialization used for content hashing: node kind
    /// and name, children in declaration order. Term names embed the
    /// helper name and parameter list, so leaves need nothing extra.
    pub fn canonical(&self, out: &mut String) {
        out.push_str(self.kind());
        out.push(':');
        out.push_str(self.name());
        match self {
            Expression::Term(_) => out.push(';'),
            Expression::And(c)
            | Expression::Or(c)
            | Expression::Chain(c)
            | Expression::Broadcast(c) => {
                out.push('(');
                for child in &c.children {
                    child.canonical(out);
                }
                out.push(')');
            }
            Expression::Implication(i) => {
                out.push('(');
                i.antecedent.canonical(out);
                i.consequent.canonical(out);
                out.push(')');
            }
        }
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Term(t) => f
                .debug_struct("Term")
                .field("id", &t.id)
                .field("name", &t.name)
                .finish(),
            Expression::Implication(i) => f
                .debug_struct("Implication")
                .field("id", &i.id)
                .field("name", &i.name)
                .field("antecedent", &i.antecedent)
                .field("consequent", &i.consequent)
                .finish(),
            other => {
                let c = match other {
                    Expression::And(c)
                    | Expression::Or(c)
                    | Expression::Chain(c)
                    | Expression::Broadcast(c) => c,
                    _ => return Ok(()),
                };
                f.debug_struct(match other {
                    Expression::And(_) => "And",
                    Expression::Or(_) => "Or",
                    Expression::Chain(_) => "Chain",
                    _ => "Broadcast",
                })
                .field("id", &c.id)
                .field("name", &c.name)
                .field("children", &c.children)
                .finish()
            }
        }
    }
}

#[cfg(test)]
#[path = "expression_tests.rs"]
mod tests;
