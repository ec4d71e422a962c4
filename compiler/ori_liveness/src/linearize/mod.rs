//! Linear block order.
//!
//! Produces the block order that lifetime positions are assigned in. Two
//! properties hold for every order produced here:
//!
//! 1. A block comes after all of its dominators.
//! 2. The blocks of a loop are contiguous.
//!
//! The order is built with a worklist seeded by the entry block. A block
//! becomes ready once all of its forward (non-back-edge) predecessors have
//! been placed. A loop is entered when its header is placed. Ready blocks
//! are inserted into the worklist so that the remaining blocks of every
//! entered loop are popped before anything outside that loop.

use crate::bitset::BitSet;
use crate::graph::DominatorTree;
use crate::ir::{BlockId, Cfg};

/// Compute the linear order of `cfg`.
///
/// # Panics
///
/// Panics if some block never becomes ready. A [`Cfg`] from
/// [`CfgBuilder`](crate::CfgBuilder) is reachable and reducible, so this
/// only fires on an internal bug.
pub fn linearize(cfg: &Cfg) -> Vec<BlockId> {
    let num_blocks = cfg.num_blocks();

    // Forward predecessors still to be placed, per block.
    let mut remaining: Vec<usize> = cfg
        .blocks()
        .iter()
        .map(|block| {
            let back_edges = cfg
                .loop_headed_by(block.id)
                .map_or(0, |l| l.back_edges.len());
            block.predecessors.len() - back_edges
        })
        .collect();

    let mut order = Vec::with_capacity(num_blocks);
    let mut entered = BitSet::new_empty(cfg.loops().len());
    let mut worklist = vec![cfg.entry()];
    while let Some(current) = worklist.pop() {
        order.push(current);
        if let Some(l) = cfg.loop_headed_by(current) {
            entered.insert(l.id.index());
        }
        for &succ in &cfg.block(current).successors {
            let count = &mut remaining[succ.index()];
            // Back edges find their header already placed with a count of 0.
            if *count == 1 {
                push_ready(cfg, &entered, &mut worklist, succ);
            }
            *count = count.saturating_sub(1);
        }
    }

    assert_eq!(
        order.len(),
        num_blocks,
        "linear order placed {} of {num_blocks} blocks",
        order.len()
    );
    tracing::debug!(blocks = order.len(), "linearized");
    order
}

/// Insert a ready block right above the topmost worklist entry it does
/// not have to wait for.
///
/// Entries that still have to come first are those belonging to an entered
/// loop that does not contain `block`. Loops not entered yet impose
/// nothing, so a sibling loop's header never gets between an entered loop
/// and the rest of its body.
fn push_ready(cfg: &Cfg, entered: &BitSet, worklist: &mut Vec<BlockId>, block: BlockId) {
    let insert_at = worklist
        .iter()
        .rposition(|&entry| !in_entered_loop_without(cfg, entered, entry, block))
        .map_or(0, |pos| pos + 1);
    worklist.insert(insert_at, block);
}

/// Is `entry` inside some entered loop that does not contain `block`?
fn in_entered_loop_without(cfg: &Cfg, entered: &BitSet, entry: BlockId, block: BlockId) -> bool {
    let mut current = cfg.block(entry).loop_id;
    while let Some(id) = current {
        let l = cfg.loop_info(id);
        if entered.contains(id.index()) && !l.contains(block) {
            return true;
        }
        current = l.parent;
    }
    false
}

/// Check the two ordering properties.
///
/// Returns a description of the first violation.
pub(crate) fn verify_linear_order(cfg: &Cfg, order: &[BlockId]) -> Result<(), String> {
    if order.len() != cfg.num_blocks() {
        return Err(format!(
            "order has {} blocks, graph has {}",
            order.len(),
            cfg.num_blocks()
        ));
    }

    let mut position = vec![usize::MAX; cfg.num_blocks()];
    for (i, &block) in order.iter().enumerate() {
        if position[block.index()] != usize::MAX {
            return Err(format!("{block:?} appears twice"));
        }
        position[block.index()] = i;
    }

    let dom = DominatorTree::build(cfg);
    for &block in order {
        if let Some(idom) = dom.idom(block) {
            if position[idom.index()] > position[block.index()] {
                return Err(format!("{block:?} placed before its dominator {idom:?}"));
            }
        }
    }

    for l in cfg.loops() {
        let members: Vec<usize> = l.blocks.iter().map(|b| position[b]).collect();
        let first = members.iter().copied().min().unwrap_or(0);
        let last = members.iter().copied().max().unwrap_or(0);
        if last - first + 1 != members.len() {
            return Err(format!(
                "loop headed by {:?} is not contiguous in the linear order",
                l.header
            ));
        }
        if order[first] != l.header {
            return Err(format!("loop headed by {:?} does not start at its header", l.header));
        }
    }
    Ok(())
}
