//! Content-model matching
//!
//! The matcher answers two questions about a model group, given the
//! ordered child names observed so far ("memory"):
//!
//! - `model_admits`: could appending one more child name still lead to
//!   some accepting completion? Checked at every child start.
//! - `model_finalize`: is the observed sequence a complete, accepting
//!   match? Checked at the model's closing boundary.
//!
//! Matching is a counting, backtracking evaluation over the node arena:
//! for complete matches it computes the set of end positions reachable
//! by whole group iterations; for admission it checks viability, i.e.
//! whether the remaining input can be absorbed as a prefix of one more
//! iteration. Ambiguous models are not rejected; any accepting
//! interpretation is sufficient.

use std::collections::BTreeSet;

use crate::error::{Result, StructureError};
use crate::schema::nodes::{DefNode, ModelKind, NodeId};
use crate::schema::occurs::Occurs;
use crate::schema::Schema;

impl Schema {
    /// Could `child` be appended to `memory` under this model?
    pub fn model_admits(&self, model: NodeId, memory: &[String], child: &str) -> bool {
        let tokens: Vec<&str> = memory
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(child))
            .collect();
        self.viable(model, &tokens, 0)
    }

    /// Check that `memory` is a complete, accepting match of this model
    pub fn model_finalize(&self, model: NodeId, memory: &[String]) -> Result<()> {
        let tokens: Vec<&str> = memory.iter().map(String::as_str).collect();
        if self.complete_ends(model, &tokens, 0).contains(&tokens.len()) {
            Ok(())
        } else {
            Err(StructureError::new(format!(
                "incomplete content: observed children [{}] do not complete the content model",
                memory.join(", ")
            ))
            .into())
        }
    }

    /// Whether one iteration of a group can match the empty sequence
    fn iteration_emptiable(&self, kind: ModelKind, children: &[NodeId]) -> bool {
        match kind {
            ModelKind::Sequence | ModelKind::All => {
                children.iter().all(|&c| self.particle_emptiable(c))
            }
            ModelKind::Choice => children.iter().any(|&c| self.particle_emptiable(c)),
        }
    }

    /// Whether a particle (with its own occurrence bounds) can match the
    /// empty sequence
    fn particle_emptiable(&self, id: NodeId) -> bool {
        match self.node(id) {
            DefNode::Element { occurs, .. } | DefNode::ElementRef { occurs, .. } => {
                occurs.is_emptiable()
            }
            DefNode::Model { kind, occurs, children } => {
                occurs.is_emptiable() || self.iteration_emptiable(*kind, children)
            }
            _ => false,
        }
    }

    /// All end positions such that `tokens[start..end]` is a complete
    /// match of the particle, bounds included
    fn complete_ends(&self, id: NodeId, tokens: &[&str], start: usize) -> BTreeSet<usize> {
        match self.node(id) {
            DefNode::Element { name, occurs, .. } | DefNode::ElementRef { name, occurs } => {
                element_ends(name, *occurs, tokens, start)
            }
            DefNode::Model { kind, occurs, children } => {
                let mut results = BTreeSet::new();
                let iter_empty = self.iteration_emptiable(*kind, children);

                // Zero consuming iterations: allowed outright, or padded
                // with empty iterations up to minOccurs
                if occurs.min == 0 || iter_empty {
                    results.insert(start);
                }

                let mut frontier = BTreeSet::from([start]);
                let mut iterations: u32 = 0;

                while !occurs.is_over(iterations) {
                    let mut next = BTreeSet::new();
                    for &p in &frontier {
                        for e in self.one_iteration_ends(*kind, children, tokens, p) {
                            if e > p {
                                next.insert(e);
                            }
                        }
                    }
                    if next.is_empty() {
                        break;
                    }
                    iterations += 1;
                    for &e in &next {
                        if iterations >= occurs.min || iter_empty {
                            results.insert(e);
                        }
                    }
                    frontier = next;
                    if iterations as usize > tokens.len().saturating_sub(start) + 1 {
                        break;
                    }
                }

                results
            }
            _ => BTreeSet::new(),
        }
    }

    /// End positions of exactly one group iteration starting at `start`
    fn one_iteration_ends(
        &self,
        kind: ModelKind,
        children: &[NodeId],
        tokens: &[&str],
        start: usize,
    ) -> BTreeSet<usize> {
        match kind {
            ModelKind::Sequence => {
                let mut positions = BTreeSet::from([start]);
                for &child in children {
                    let mut next = BTreeSet::new();
                    for &p in &positions {
                        next.extend(self.complete_ends(child, tokens, p));
                    }
                    positions = next;
                    if positions.is_empty() {
                        break;
                    }
                }
                positions
            }
            ModelKind::Choice => {
                let mut ends = BTreeSet::new();
                for &child in children {
                    ends.extend(self.complete_ends(child, tokens, start));
                }
                ends
            }
            ModelKind::All => self.all_group_ends(children, tokens, start),
        }
    }

    /// End positions for an `all` group: windows whose name counts put
    /// every declared child within its bounds, order free
    fn all_group_ends(&self, children: &[NodeId], tokens: &[&str], start: usize) -> BTreeSet<usize> {
        let declared = self.all_group_alphabet(children);

        let run = tokens[start..]
            .iter()
            .take_while(|t| declared.iter().any(|(name, _)| name == *t))
            .count();

        let mut ends = BTreeSet::new();
        for end in start..=start + run {
            let window = &tokens[start..end];
            let accepted = declared.iter().all(|(name, occurs)| {
                let count = window.iter().filter(|t| *t == name).count() as u32;
                occurs.contains(count)
            });
            if accepted {
                ends.insert(end);
            }
        }
        ends
    }

    /// The (name, occurs) alphabet of an `all` group's element children
    fn all_group_alphabet(&self, children: &[NodeId]) -> Vec<(&str, Occurs)> {
        children
            .iter()
            .filter_map(|&c| match self.node(c) {
                DefNode::Element { name, occurs, .. } | DefNode::ElementRef { name, occurs } => {
                    Some((name.as_str(), *occurs))
                }
                // Groups nested in `all` are rejected at compile time
                _ => None,
            })
            .collect()
    }

    /// Viability: can the particle absorb all of `tokens[start..]` such
    /// that some accepting completion still exists?
    fn viable(&self, id: NodeId, tokens: &[&str], start: usize) -> bool {
        match self.node(id) {
            DefNode::Element { name, occurs, .. } | DefNode::ElementRef { name, occurs } => {
                let rest = &tokens[start..];
                rest.iter().all(|t| *t == name.as_str())
                    && !occurs.is_exceeded(rest.len() as u32)
            }
            DefNode::Model { kind, occurs, children } => {
                let len = tokens.len();
                let mut frontier = BTreeSet::from([start]);
                let mut iterations: u32 = 0;

                loop {
                    // Whole input consumed by complete iterations; any
                    // unmet minimum can be satisfied by future children
                    if frontier.contains(&len) {
                        return true;
                    }
                    // No further iteration may start
                    if occurs.is_over(iterations) {
                        return false;
                    }
                    if frontier
                        .iter()
                        .any(|&p| self.one_iteration_viable(*kind, children, tokens, p))
                    {
                        return true;
                    }

                    let mut next = BTreeSet::new();
                    for &p in &frontier {
                        for e in self.one_iteration_ends(*kind, children, tokens, p) {
                            if e > p {
                                next.insert(e);
                            }
                        }
                    }
                    if next.is_empty() {
                        return false;
                    }
                    iterations += 1;
                    frontier = next;
                    if iterations as usize > len.saturating_sub(start) + 1 {
                        return false;
                    }
                }
            }
            _ => false,
        }
    }

    /// Viability of a single group iteration
    fn one_iteration_viable(
        &self,
        kind: ModelKind,
        children: &[NodeId],
        tokens: &[&str],
        start: usize,
    ) -> bool {
        match kind {
            ModelKind::Sequence => {
                let mut positions = BTreeSet::from([start]);
                for &child in children {
                    if positions.iter().any(|&p| self.viable(child, tokens, p)) {
                        return true;
                    }
                    let mut next = BTreeSet::new();
                    for &p in &positions {
                        next.extend(self.complete_ends(child, tokens, p));
                    }
                    positions = next;
                    if positions.is_empty() {
                        return false;
                    }
                }
                false
            }
            ModelKind::Choice => children.iter().any(|&c| self.viable(c, tokens, start)),
            ModelKind::All => {
                let declared = self.all_group_alphabet(children);
                let rest = &tokens[start..];

                rest.iter()
                    .all(|t| declared.iter().any(|(name, _)| name == t))
                    && declared.iter().all(|(name, occurs)| {
                        let count = rest.iter().filter(|t| *t == name).count() as u32;
                        !occurs.is_exceeded(count)
                    })
            }
        }
    }
}

/// End positions for a run of a single repeated element
fn element_ends(name: &str, occurs: Occurs, tokens: &[&str], start: usize) -> BTreeSet<usize> {
    let run = tokens[start..].iter().take_while(|t| **t == name).count();

    let lo = occurs.min as usize;
    let hi = match occurs.max {
        Some(max) => run.min(max as usize),
        None => run,
    };

    let mut ends = BTreeSet::new();
    for k in lo..=hi {
        ends.insert(start + k);
    }
    ends
}
