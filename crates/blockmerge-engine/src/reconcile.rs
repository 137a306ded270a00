//! Identifier-based reconciliation of incoming blocks against a baseline.
//!
//! The result is built as two lists, retained baseline blocks and appended
//! incoming blocks, and never by mutating the baseline while walking it.

use std::collections::HashSet;

use crate::block::Block;
use crate::identity::{self, identity};
use crate::markup::MarkupError;

/// Outcome of reconciling one source set against one baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Baseline positions removed because an incoming block reuses their id.
    pub superseded: Vec<usize>,
    /// Baseline blocks kept, in baseline order.
    pub retained: Vec<Block>,
    /// Incoming blocks to add after the retained ones, in source order.
    pub appended: Vec<Block>,
    /// Incoming blocks skipped because an earlier incoming block had the same id.
    pub dropped: Vec<Block>,
}

impl Reconciliation {
    /// Retained blocks followed by appended blocks.
    pub fn merged(&self) -> Vec<Block> {
        self.retained
            .iter()
            .chain(self.appended.iter())
            .cloned()
            .collect()
    }

    pub fn appended_ids(&self) -> Vec<&str> {
        ids_of(&self.appended)
    }

    pub fn dropped_ids(&self) -> Vec<&str> {
        ids_of(&self.dropped)
    }
}

fn ids_of(blocks: &[Block]) -> Vec<&str> {
    blocks
        .iter()
        .filter_map(|b| b.attribute(identity::ID_ATTRIBUTE))
        .collect()
}

/// Reconcile `incoming` against `baseline`.
///
/// For every id supplied by `incoming`, the first baseline block with that id
/// is superseded. Incoming blocks are then appended in order; a block whose id
/// was already appended is dropped, so the first occurrence wins. Duplicate
/// ids that already exist within the baseline are left alone.
///
/// Fails when a block in either list has no id.
pub fn reconcile(baseline: &[Block], incoming: &[Block]) -> Result<Reconciliation, MarkupError> {
    identity::require_identities(baseline)?;

    let mut superseded: Vec<usize> = Vec::new();
    let mut marked: HashSet<&str> = HashSet::new();
    for (ordinal, block) in incoming.iter().enumerate() {
        let id = identity(block, ordinal)?;
        if !marked.insert(id) {
            continue;
        }
        if let Some(position) = identity::position(baseline, id) {
            superseded.push(position);
        }
    }
    superseded.sort_unstable();

    let retained: Vec<Block> = baseline
        .iter()
        .enumerate()
        .filter(|(position, _)| superseded.binary_search(position).is_err())
        .map(|(_, block)| block.clone())
        .collect();

    let mut appended = Vec::new();
    let mut dropped = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (ordinal, block) in incoming.iter().enumerate() {
        let id = identity(block, ordinal)?;
        if seen.insert(id) {
            appended.push(block.clone());
        } else {
            dropped.push(block.clone());
        }
    }

    Ok(Reconciliation {
        superseded,
        retained,
        appended,
        dropped,
    })
}
