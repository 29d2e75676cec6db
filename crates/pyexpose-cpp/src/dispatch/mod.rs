//! Overload dispatch trees.
//!
//! A dispatch tree decides, one argument position at a time, which of a set
//! of fixed-arity overloads a runtime call reaches. Each node holds one slot
//! per coercion [`Bucket`], a list of exposed-class branches, and at most one
//! terminal call.
//!
//! Resolution stops at the first viable branch of each position rather than
//! ranking whole signatures. Given `S` derived from `B`, overloads `(S,B,B)`
//! and `(B,S,S)` called with `(S,S,S)` pick `(S,B,B)` because the first
//! position matched `S` first.
//!
//! - [`emit`]: turns a tree into guarded [`emit::Step`]s and renders them
//! - [`route`]: evaluates emitted steps against modelled runtime values

pub mod emit;
pub mod route;

use std::cmp::Reverse;

use serde::Serialize;
use tracing::debug;

use pyexpose_core::decl::{DeclGraph, Ty, TypeKey};
use pyexpose_core::error::{SpecError, SpecResult};

use crate::conversion::{Bucket, ConversionRegistry};

pub use emit::{emit, emit_checks, render, ArgAccessor, CallStep, CountOp, Guard, Step};
pub use route::{route, RuntimeValue};

/// One fixed-arity overload fed to the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Caller-assigned identifier, reported back by terminal calls.
    pub id: usize,
    /// Signature text used in ambiguity errors.
    pub label: String,
    #[serde(skip)]
    pub args: Vec<Ty>,
}

/// A class-typed branch of a dispatch node.
#[derive(Debug, Clone)]
pub struct ObjectBranch {
    pub ty: Ty,
    pub key: TypeKey,
    pub node: DispatchNode,
}

/// One argument position of a dispatch tree.
#[derive(Debug, Clone, Default)]
pub struct DispatchNode {
    pub buckets: [Option<Box<DispatchNode>>; 5],
    pub objects: Vec<ObjectBranch>,
    pub terminal: Option<Candidate>,
}

impl DispatchNode {
    pub fn bucket(&self, bucket: Bucket) -> Option<&DispatchNode> {
        self.buckets[bucket.index()].as_deref()
    }

    /// Children in check order: objects first, then buckets.
    pub fn children(&self) -> impl Iterator<Item = &DispatchNode> {
        self.objects
            .iter()
            .map(|o| &o.node)
            .chain(self.buckets.iter().filter_map(|b| b.as_deref()))
    }

    pub fn has_children(&self) -> bool {
        !self.objects.is_empty() || self.buckets.iter().any(Option::is_some)
    }

    /// Fewest further arguments that reach a terminal.
    pub fn min_arg_length(&self) -> usize {
        if self.terminal.is_some() {
            return 0;
        }
        self.children()
            .map(|n| n.min_arg_length() + 1)
            .min()
            .unwrap_or(0)
    }

    /// Most further arguments that reach a terminal.
    pub fn max_arg_length(&self) -> usize {
        self.children()
            .map(|n| n.max_arg_length() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().map(DispatchNode::size).sum::<usize>()
    }

    /// Fold `other` into `self`.
    ///
    /// Two terminals meeting at one node make the overloads indistinguishable.
    pub fn merge(mut self, other: Option<DispatchNode>) -> SpecResult<DispatchNode> {
        let Some(other) = other else {
            return Ok(self);
        };
        if let Some(theirs) = other.terminal {
            if let Some(ours) = &self.terminal {
                return Err(SpecError::AmbiguousOverload {
                    first: theirs.label,
                    second: ours.label.clone(),
                });
            }
            self.terminal = Some(theirs);
        }
        for (slot, theirs) in other.buckets.into_iter().enumerate() {
            if let Some(theirs) = theirs {
                let ours = self.buckets[slot].take().map(|b| *b);
                self.buckets[slot] = Some(Box::new(theirs.merge(ours)?));
            }
        }
        let mut pending = other.objects;
        for branch in &mut self.objects {
            if let Some(pos) = pending.iter().position(|o| o.key == branch.key) {
                let theirs = pending.remove(pos);
                let ours = std::mem::take(&mut branch.node);
                branch.node = ours.merge(Some(theirs.node))?;
            }
        }
        self.objects.extend(pending);
        Ok(self)
    }

    /// Order class branches so that derived classes are tested before bases.
    pub fn sort_objects(&mut self, graph: &DeclGraph) {
        self.objects.sort_by_cached_key(|o| {
            let target = graph.strip_pointer_or_reference(&o.ty);
            Reverse(graph.class_of(&target).map_or(0, |c| graph.base_class_count(c)))
        });
        for branch in &mut self.objects {
            branch.node.sort_objects(graph);
        }
        for slot in self.buckets.iter_mut().flatten() {
            slot.sort_objects(graph);
        }
    }
}

/// Build and sort the dispatch tree of a set of fixed-arity overloads.
pub fn build_tree(
    candidates: Vec<Candidate>,
    registry: &ConversionRegistry<'_>,
) -> SpecResult<DispatchNode> {
    let graph = registry.graph();
    let items = candidates.into_iter().map(|c| (0, c)).collect();
    let mut tree = build_node(items, registry)?;
    tree.sort_objects(graph);
    debug!(
        nodes = tree.size(),
        min = tree.min_arg_length(),
        max = tree.max_arg_length(),
        "dispatch tree built"
    );
    Ok(tree)
}

/// `items` pairs each candidate with the number of arguments already consumed.
fn build_node(
    mut items: Vec<(usize, Candidate)>,
    registry: &ConversionRegistry<'_>,
) -> SpecResult<DispatchNode> {
    let graph = registry.graph();
    let key = |(pos, c): &(usize, Candidate)| {
        c.args
            .get(*pos)
            .map(|t| graph.type_string(t))
            .unwrap_or_default()
    };
    items.sort_by_cached_key(key);

    let mut node = DispatchNode::default();
    let mut rest = items.into_iter().peekable();
    while let Some(first) = rest.next() {
        let group_key = key(&first);
        let mut group = vec![first];
        while let Some(next) = rest.next_if(|item| key(item) == group_key) {
            group.push(next);
        }

        if group_key.is_empty() {
            let mut done = group.into_iter().map(|(_, c)| c);
            let terminal = done.next();
            if let (Some(a), Some(b)) = (&terminal, done.next()) {
                return Err(SpecError::AmbiguousOverload {
                    first: a.label.clone(),
                    second: b.label,
                });
            }
            node.terminal = terminal;
            continue;
        }

        let Some(ty) = group[0].1.args.get(group[0].0).cloned() else {
            continue;
        };
        let child = build_node(
            group.into_iter().map(|(pos, c)| (pos + 1, c)).collect(),
            registry,
        )?;
        match registry.bucket_of(&ty) {
            Some(bucket) => {
                let slot = bucket.index();
                let existing = node.buckets[slot].take().map(|b| *b);
                node.buckets[slot] = Some(Box::new(child.merge(existing)?));
            }
            None => node.objects.push(ObjectBranch {
                key: TypeKey(group_key),
                ty,
                node: child,
            }),
        }
    }
    Ok(node)
}
